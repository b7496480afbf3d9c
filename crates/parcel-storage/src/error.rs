use std::path::PathBuf;

/// Errors produced by object store backends.
///
/// These are infrastructure failures; callers treat them as transient and
/// propagate them unchanged.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt object header in {path}: {message}")]
    CorruptObject { path: PathBuf, message: String },

    #[error("storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
