//! Invocation of external programs.
//!
//! Renderers, PDF page tools and the reshape script are all reached through
//! the [`ToolRunner`] trait. [`SystemRunner`] spawns real processes; tests
//! substitute a runner that records command lines and scripts the output.

use std::fmt;
use std::path::Path;
use std::process::Command;

use crate::error::{Error, Result};

/// A program and its argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Value following `flag` in the argument list, if any.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Value of a `key=value` argument, as used by the reshape script.
    pub fn keyed_value(&self, key: &str) -> Option<&str> {
        self.args.iter().find_map(|a| {
            a.strip_prefix(key)
                .and_then(|rest| rest.strip_prefix('='))
        })
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Something that can run an external command to completion.
pub trait ToolRunner {
    /// Run `cmd`, blocking until it exits.
    ///
    /// A non-zero exit is an [`Error::ToolFailed`].
    fn run(&self, cmd: &ToolCommand) -> Result<ToolOutput>;
}

impl<R: ToolRunner + ?Sized> ToolRunner for &R {
    fn run(&self, cmd: &ToolCommand) -> Result<ToolOutput> {
        (**self).run(cmd)
    }
}

/// Runs commands as child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, cmd: &ToolCommand) -> Result<ToolOutput> {
        log::info!("{cmd}");
        let output = Command::new(&cmd.program)
            .args(&cmd.args)
            .output()
            .map_err(|e| {
                log::error!("Failed on command: {cmd}: {e}");
                Error::Io(e)
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            log::error!(
                "{cmd}\n{} returned {}\nstdout:{stdout}\nstderr:{stderr}",
                cmd.program,
                output.status
            );
            return Err(Error::ToolFailed {
                command: cmd.to_string(),
                status: output.status.to_string(),
                stderr,
            });
        }

        log::debug!(
            "{} returned {}\nstdout:{stdout}\nstderr:{stderr}",
            cmd.program,
            output.status
        );
        Ok(ToolOutput { stdout, stderr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_display_joins_args() {
        let cmd = ToolCommand::new("pdftk").args(["a.pdf", "cat", "output", "b.pdf"]);
        assert_eq!(cmd.to_string(), "pdftk a.pdf cat output b.pdf");
    }

    #[test]
    fn test_flag_and_keyed_values() {
        let cmd = ToolCommand::new("pdfedit")
            .args(["--outfile", "x.pdf", "operation=shift,even_pages"]);
        assert_eq!(cmd.flag_value("--outfile"), Some("x.pdf"));
        assert_eq!(cmd.flag_value("--missing"), None);
        assert_eq!(cmd.keyed_value("operation"), Some("shift,even_pages"));
        assert_eq!(cmd.keyed_value("oper"), None);
    }

    #[test]
    fn test_system_runner_reports_missing_program() {
        let cmd = ToolCommand::new("folio-test-no-such-program-xyz");
        assert!(matches!(SystemRunner.run(&cmd), Err(Error::Io(_))));
    }
}
