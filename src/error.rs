use thiserror::Error;

/// Error kinds surfaced by the core state machine. Each variant carries
/// enough context to become a `last_msg` token without re-deriving it at
/// the call site.
#[derive(Error, Debug)]
pub enum ExtendError {
    #[error("probe failed: {0}")]
    ProbeFailed(String),

    #[error("extension failed (resolution)")]
    Resolution,

    #[error("extension failed (insufficient space)")]
    InsufficientSpace,

    #[error("apply failed: {command} exited {exit_code}")]
    ApplyFailed { command: String, exit_code: i32 },

    #[error("lock busy")]
    LockBusy,
}

impl ExtendError {
    /// The human-readable token stored in a volume's `last_msg`, matching
    /// the phrasing spec'd for each failure class.
    pub fn status_token(&self) -> String {
        match self {
            ExtendError::ProbeFailed(_) => "probe failed".to_string(),
            ExtendError::Resolution => "extension failed (resolution)".to_string(),
            ExtendError::InsufficientSpace => "extension failed (insufficient space)".to_string(),
            ExtendError::ApplyFailed { exit_code, .. } => format!("apply failed (exit {exit_code})"),
            ExtendError::LockBusy => "lock busy".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtendError>;
