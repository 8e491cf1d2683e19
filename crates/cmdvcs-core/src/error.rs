use std::path::PathBuf;
use thiserror::Error;

use cmdvcs_process::ProcessError;

use crate::config::Subcommand;
use crate::parser::ParseError;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("{subcommand} exited with code {exit_code}: {stderr}")]
    ToolFailed {
        subcommand: Subcommand,
        exit_code: i32,
        stderr: String,
    },

    #[error("{} is newly added and has no base revision", .0.display())]
    NoBaseRevision(PathBuf),

    #[error("Operation was cancelled")]
    Cancelled,
}

impl AdapterError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AdapterError::Cancelled)
    }
}
