use thiserror::Error;

use crate::workspace::ConnectionId;

#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("backend initialization failed: {0}")]
    Backend(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("event loop error: {0}")]
    EventLoop(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

pub type Result<T> = std::result::Result<T, CompositorError>;

/// Failure reported by, or posted to, a single client connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("out of memory")]
    NoMemory,

    #[error("invalid object: {0}")]
    InvalidObject(String),

    #[error("connection closed")]
    Closed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceError {
    #[error("unsupported ext-workspace version {0}")]
    UnsupportedVersion(u32),

    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    #[error("connection {0} is already bound")]
    AlreadyBound(ConnectionId),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}
