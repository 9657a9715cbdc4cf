use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide error type. Variants follow the taxonomy of the error-handling
/// design: input validation, file I/O, build-time configuration, and
/// logical invariant violations are kept distinct so callers (and the CLI)
/// can report a one-line, actionable message.
#[derive(Error, Debug)]
pub enum AfnError {
    #[error("could not {op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Config(String),

    #[error("internal invariant violated: {0}")]
    Invariant(String),

    #[error("failed to (de)serialize index: {0}")]
    Bincode(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, AfnError>;

impl AfnError {
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AfnError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}
