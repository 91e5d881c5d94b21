//! Failure envelope shared by all collaborator traits.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CollabResult<T> = Result<T, CollabError>;

/// Error reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollabError {
    /// Which collaborator failed (`notifier`, `kv`, `settings`, `coupons`, `signer`).
    pub collaborator: &'static str,
    /// Stable machine-readable code.
    pub code: String,
    pub message: String,
    /// Whether a later retry may succeed.
    pub retryable: bool,
}

impl CollabError {
    pub fn new(
        collaborator: &'static str,
        code: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            collaborator,
            code: code.into(),
            message: message.into(),
            retryable,
        }
    }

    /// Transient failure (network, timeouts, busy storage).
    pub fn transient(
        collaborator: &'static str,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(collaborator, code, message, true)
    }
}

impl Display for CollabError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} failed ({}): {}",
            self.collaborator, self.code, self.message
        )
    }
}

impl Error for CollabError {}
