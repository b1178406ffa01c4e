//! Error taxonomy shared by the engine and its callers.

use thiserror::Error;

use crate::ast::AstError;
use crate::data::DataError;
use crate::lower::LowerError;
use crate::series::SeriesError;

/// Coarse error kinds with stable codes and process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Usage,
    InvalidData,
    UnsupportedNode,
    Lower,
    Causality,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Usage => "USAGE",
            ErrorKind::InvalidData => "INVALID_DATA",
            ErrorKind::UnsupportedNode => "UNSUPPORTED_NODE",
            ErrorKind::Lower => "LOWER_ERROR",
            ErrorKind::Causality => "CAUSALITY_VIOLATION",
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Usage => 1,
            ErrorKind::InvalidData => 2,
            ErrorKind::UnsupportedNode | ErrorKind::Lower => 3,
            ErrorKind::Causality => 4,
        }
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    InvalidData(#[from] DataError),

    #[error(transparent)]
    Ast(#[from] AstError),

    #[error(transparent)]
    Lower(#[from] LowerError),

    /// A forward-series contract was broken. Always an engine bug.
    #[error("series `{series}` at bar {bar}: {source}")]
    Causality {
        series: String,
        bar: usize,
        #[source]
        source: SeriesError,
    },
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidData(_) => ErrorKind::InvalidData,
            CoreError::Ast(AstError::Json(_)) => ErrorKind::InvalidData,
            CoreError::Ast(AstError::UnsupportedNode { .. }) => ErrorKind::UnsupportedNode,
            CoreError::Ast(AstError::Malformed { .. }) => ErrorKind::Lower,
            CoreError::Lower(_) => ErrorKind::Lower,
            CoreError::Causality { .. } => ErrorKind::Causality,
        }
    }
}
