//! System shutdown command.

use std::process::{Command, Stdio};

use tracing::info;

use crate::error::ShutdownError;

/// Something that powers the system off.
pub trait ShutdownCommand: Send {
    fn issue(&mut self) -> Result<(), ShutdownError>;
}

/// Runs an external program, by default `sudo shutdown -h now`.
#[derive(Debug, Clone)]
pub struct CommandShutdown {
    argv: Vec<String>,
}

impl CommandShutdown {
    /// Program first, then its arguments.
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

impl ShutdownCommand for CommandShutdown {
    fn issue(&mut self) -> Result<(), ShutdownError> {
        let Some((program, args)) = self.argv.split_first() else {
            return Err(ShutdownError::CommandFailed("no shutdown command configured".to_string()));
        };

        info!("Running shutdown command: {}", self.argv.join(" "));

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| ShutdownError::CommandFailed(format!("{}: {}", program, e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(ShutdownError::CommandFailed(format!("{} exited with {}", program, status)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_command_fails() {
        let mut cmd = CommandShutdown::new(Vec::new());
        assert!(matches!(cmd.issue(), Err(ShutdownError::CommandFailed(_))));
    }

    #[test]
    fn test_missing_program_fails() {
        let mut cmd = CommandShutdown::new(vec!["/nonexistent/rcpt-shutdown".to_string()]);
        assert!(matches!(cmd.issue(), Err(ShutdownError::CommandFailed(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_checked() {
        let mut ok = CommandShutdown::new(vec!["true".to_string()]);
        assert!(ok.issue().is_ok());

        let mut failing = CommandShutdown::new(vec!["false".to_string()]);
        assert!(matches!(failing.issue(), Err(ShutdownError::CommandFailed(_))));
    }
}
