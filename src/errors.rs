use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{operation}: failed to launch `{program}`: {source}")]
    Launch {
        operation: String,
        program: String,
        command: Vec<String>,
        source: std::io::Error,
    },

    #[error("{operation}: command exited with status {status:?}")]
    Command {
        operation: String,
        command: Vec<String>,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("{operation}: failed to parse query output: {source}")]
    Parse {
        operation: String,
        command: Vec<String>,
        stdout: String,
        stderr: String,
        source: serde_json::Error,
    },
}

impl FetchError {
    /// Transport and protocol failures abort the run. A query the service
    /// rejected only affects the batch it was issued for.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FetchError::Command { .. })
    }

    #[must_use]
    pub fn command_line(&self) -> String {
        let command = match self {
            FetchError::Launch { command, .. }
            | FetchError::Command { command, .. }
            | FetchError::Parse { command, .. } => command,
        };
        command.join(" ")
    }

    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        match self {
            FetchError::Launch { .. } => None,
            FetchError::Command { stderr, .. } | FetchError::Parse { stderr, .. } => {
                Some(stderr.as_str()).filter(|s| !s.trim().is_empty())
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Config error in {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error in {path}: {source}")]
    Json { path: PathBuf, source: serde_json::Error },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Render error: {0}")]
    Render(String),
}
