//! CLI application for receipt capture, storage and battery monitoring.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{batch, battery, config, parse, process, records};

/// Receipt capture - OCR receipts into a searchable store
#[derive(Parser)]
#[command(name = "rcpt")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a single receipt image
    Process(process::ProcessArgs),

    /// Process multiple receipt images
    Batch(batch::BatchArgs),

    /// Extract fields from already-recognized text
    Parse(parse::ParseArgs),

    /// List stored receipts
    List(records::ListArgs),

    /// Show one stored receipt
    Show(records::ShowArgs),

    /// Correct fields of a stored receipt
    Edit(records::EditArgs),

    /// Delete a stored receipt
    Delete(records::DeleteArgs),

    /// Write the CSV export
    Export(records::ExportArgs),

    /// Show spending statistics
    Stats(records::StatsArgs),

    /// Battery fuel gauge monitoring
    Battery(battery::BatteryArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Process(args) => process::run(args, config_path).await,
        Commands::Batch(args) => batch::run(args, config_path).await,
        Commands::Parse(args) => parse::run(args, config_path).await,
        Commands::List(args) => records::list(args, config_path).await,
        Commands::Show(args) => records::show(args, config_path).await,
        Commands::Edit(args) => records::edit(args, config_path).await,
        Commands::Delete(args) => records::delete(args, config_path).await,
        Commands::Export(args) => records::export(args, config_path).await,
        Commands::Stats(args) => records::stats(args, config_path).await,
        Commands::Battery(args) => battery::run(args, config_path).await,
        Commands::Config(args) => config::run(args, config_path).await,
    }
}
