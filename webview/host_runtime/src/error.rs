use std::io;
use std::path::PathBuf;

/// Per-field failure recorded while importing a `setState` payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("unknown field: {0}")]
    Unknown(String),

    #[error("field is read-only: {0}")]
    ReadOnly(String),

    #[error("field {0} only accepts scalar values")]
    NotScalar(String),

    #[error("field {field} rejected value: {reason}")]
    TypeMismatch { field: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("command {command} failed: {reason}")]
    Failed { command: String, reason: String },

    #[error("command {0} dropped its completion without reporting")]
    CompletionDropped(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetError {
    #[error("page name is empty")]
    EmptyPage,

    #[error("page escapes the web root: {0}")]
    OutsideRoot(String),

    #[error("page does not exist: {page} ({})", .path.display())]
    PageNotFound { page: String, path: PathBuf },

    #[error("url is not served by this origin: {0}")]
    ForeignOrigin(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("bridge transport closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("host context is closed")]
pub struct HostContextClosed;

/// Failures raised by the host document surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("no active document")]
    NoActiveDocument,

    #[error("transaction already open: {0}")]
    TransactionOpen(String),

    #[error("no transaction is open")]
    NoTransaction,

    #[error("{0}")]
    Rejected(String),
}

/// Result of a host-context handler that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    #[error("operation cancelled by user")]
    Cancelled,

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("failed to start host application: {0}")]
    Startup(String),

    #[error("unknown panel: {0}")]
    UnknownPanel(String),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("bridge i/o failed: {0}")]
    Io(#[from] io::Error),
}
