use thiserror::Error;

/// Failures raised by the remote share backend.
///
/// None of these are fatal: the supervisor and fetcher log them and degrade
/// to "zero remote items" or "skip this image".
#[derive(Debug, Error)]
pub enum ShareError {
    /// An operation needed a live session and mounted share but had none.
    #[error("not connected to the share")]
    NotConnected,

    /// The network connection to the server could not be established.
    #[error("cannot reach server {server}: {reason}")]
    Connect { server: String, reason: String },

    /// The server rejected the credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The server is reachable but does not expose the requested share.
    #[error("share not found: {0}")]
    ShareNotFound(String),

    /// The configured folder does not exist inside the share.
    #[error("folder does not exist on share: {0}")]
    FolderMissing(String),

    /// Listing the folder failed part-way.
    #[error("listing {folder} failed: {reason}")]
    List { folder: String, reason: String },

    /// Reading a remote file failed.
    #[error("reading {path} failed: {reason}")]
    Read { path: String, reason: String },

    /// Closing one of the held handles failed.
    #[error("closing {handle} failed: {reason}")]
    Teardown {
        handle: &'static str,
        reason: String,
    },
}
