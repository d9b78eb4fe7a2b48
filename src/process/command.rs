//! Argument vectors for external tools

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// A program plus its argument vector, built before anything is spawned.
///
/// Stages build these so the exact invocation can be asserted in tests
/// without running the tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
}

impl ToolCommand {
    /// Start a command for `program`
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Insert an argument at `index` (clamped to the end)
    pub fn insert_arg(mut self, index: usize, arg: impl AsRef<OsStr>) -> Self {
        let index = index.min(self.args.len());
        self.args.insert(index, arg.as_ref().to_os_string());
        self
    }

    /// Run in `dir`
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Program path or name
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Short tool name for logs and errors (file name of the program)
    pub fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    /// Arguments as lossy strings
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Whether `flag` appears in the argument vector
    pub fn has_arg(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    /// Argument following `flag`, if any
    pub fn value_of(&self, flag: &str) -> Option<String> {
        let pos = self.args.iter().position(|a| a == flag)?;
        self.args
            .get(pos + 1)
            .map(|a| a.to_string_lossy().into_owned())
    }

    pub(crate) fn to_tokio(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl std::fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}
