use std::path::PathBuf;

use thiserror::Error;

/// Failure to read the definition tree. Missing directories are not errors.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of a single call against Discord's application command API.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error(transparent)]
    Discord(#[from] serenity::Error),
    #[error("unexpected command payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("{0}")]
    Rejected(String),
}

/// Causes that abort a whole reconcile pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("loading definitions failed: {0}")]
    Load(#[from] LoadError),
    #[error("fetching registered commands failed: {0}")]
    Fetch(#[source] RemoteError),
}
