//! Error types for the browser synchronization engine.
//!
//! None of these reach the user. Stale references are not errors at all
//! (lookups return `None`); everything here is logged where it happens and
//! the affected scope shows whatever it could compute.

use thiserror::Error;

use crate::symbols::{DeclKind, IndexError};
use crate::types::ProjectId;

#[derive(Error, Debug)]
pub enum ClassViewError {
    #[error("Unexpected {kind} entry under {scope}")]
    UnexpectedKind { kind: DeclKind, scope: String },

    #[error("Invariant violated in {scope}: {reason}")]
    InvariantViolation { scope: String, reason: String },

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Project {0} is closed")]
    ProjectClosed(ProjectId),

    #[error("Update queue closed unexpectedly")]
    ChannelClosed,

    #[error("Failed to load config: {reason}")]
    Config { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ClassViewError {
    fn from(e: figment::Error) -> Self {
        ClassViewError::Config {
            reason: e.to_string(),
        }
    }
}

pub type ClassViewResult<T> = Result<T, ClassViewError>;
