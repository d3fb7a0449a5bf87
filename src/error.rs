use std::fmt;
use thiserror::Error;

/// Why no usable chain of links exists between two frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkFailure {
    /// At least one of the frames was never registered.
    UnknownFrame,
    /// Both frames exist but live in different connected components.
    Disconnected,
    /// A link on the path has not accepted any transformation yet.
    EmptyHistory,
}

impl fmt::Display for LinkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkFailure::UnknownFrame => write!(f, "unknown frame"),
            LinkFailure::Disconnected => write!(f, "frames are not connected"),
            LinkFailure::EmptyHistory => write!(f, "link history is empty"),
        }
    }
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("source and destination both refer to frame '{0}'")]
    InvalidQuery(String),

    #[error("no usable link from frame '{from}' to frame '{to}': {reason}")]
    NoSuchLink {
        from: String,
        to: String,
        reason: LinkFailure,
    },

    #[error("a frame cannot be linked to itself: '{0}'")]
    SelfLoop(String),

    #[error("link weights must be finite and non-negative, got {0}")]
    InvalidWeight(f64),
}

pub type TransformResult<T> = Result<T, TransformError>;
