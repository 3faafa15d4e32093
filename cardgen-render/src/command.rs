//! External tool invocation
//!
//! Every external program cardgen drives (`usdrecord`, `usdzip`, `usdcat`)
//! goes through a [`CommandRunner`], so tests can substitute a fake.

use cardgen_core::{Error, Result};
use log::debug;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// A fully specified tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    /// Run the tool from `dir` instead of the current directory
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Value following `flag`, if present
    pub fn flag_value(&self, flag: &str) -> Option<&OsStr> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(OsString::as_os_str)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Runs tool commands to completion
pub trait CommandRunner: Send + Sync {
    /// Run `command` and block until it exits; a non-zero exit is an error
    fn run(&self, command: &ToolCommand) -> Result<()>;
}

/// Runs commands as child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, command: &ToolCommand) -> Result<()> {
        debug!("Running {}", command);
        let mut process = Command::new(command.program());
        process
            .args(command.get_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        if let Some(dir) = command.get_current_dir() {
            process.current_dir(dir);
        }

        let output = process.output().map_err(|source| Error::ToolSpawn {
            program: command.program().to_string(),
            source,
        })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.trim().is_empty() {
                debug!("{} stderr:\n{}", command.program(), stderr.trim_end());
            }
            Err(Error::ToolFailed {
                program: command.program().to_string(),
                status: output.status.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_display_and_flags() {
        let command = ToolCommand::new("usdrecord")
            .args(["--camera", "XPos"])
            .arg(Path::new("rig.usda"))
            .current_dir("/tmp");
        assert_eq!(command.to_string(), "usdrecord --camera XPos rig.usda");
        assert_eq!(command.flag_value("--camera"), Some(OsStr::new("XPos")));
        assert_eq!(command.flag_value("--missing"), None);
        assert_eq!(command.get_current_dir(), Some(Path::new("/tmp")));
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let command = ToolCommand::new("cardgen-definitely-not-a-real-tool");
        assert!(matches!(
            ProcessRunner.run(&command),
            Err(Error::ToolSpawn { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_tool_failure() {
        let command = ToolCommand::new("sh").args(["-c", "echo oops >&2; exit 3"]);
        match ProcessRunner.run(&command) {
            Err(Error::ToolFailed { program, status }) => {
                assert_eq!(program, "sh");
                assert!(status.contains('3'));
            }
            other => panic!("expected tool failure, got {:?}", other),
        }
        assert!(ProcessRunner
            .run(&ToolCommand::new("sh").args(["-c", "exit 0"]))
            .is_ok());
    }
}
