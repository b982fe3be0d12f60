//! Error taxonomy for the sweep pipeline.
use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;

/// Failure reported by one of the remote collaborators.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The platform asked us to back off for the given duration.
    #[error("rate limited; retry after {0:?}")]
    RateLimited(Duration),
    #[error("network error: {0}")]
    Transient(String),
    #[error("remote rejected request ({code}): {description}")]
    Rejected { code: i64, description: String },
    /// The response did not have the shape we expect.
    #[error("unexpected response from remote API: {0}")]
    Protocol(String),
    /// The configured gateway address cannot be turned into a request URL.
    #[error("invalid gateway endpoint: {0}")]
    Endpoint(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Protocol(err.to_string())
        } else {
            RemoteError::Transient(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("aborted: {0}")]
    Aborted(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("prompt error: {0}")]
    Prompt(String),
    #[error("journal error: {0}")]
    Journal(#[from] sqlx::Error),
    #[error("journal migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl SweepError {
    /// Whether the error ends the whole run rather than just the current chat.
    pub fn is_fatal(&self) -> bool {
        match self {
            SweepError::Remote(RemoteError::Protocol(_) | RemoteError::Endpoint(_)) => true,
            SweepError::Remote(_) => false,
            _ => true,
        }
    }

    /// Whether the remote answered in a shape we no longer understand.
    pub fn suggests_api_change(&self) -> bool {
        matches!(self, SweepError::Remote(RemoteError::Protocol(_)))
    }
}

pub type Result<T> = std::result::Result<T, SweepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_non_protocol_remote_errors_are_chat_local() {
        assert!(!SweepError::Remote(RemoteError::Transient("reset".into())).is_fatal());
        assert!(!SweepError::Remote(RemoteError::Rejected {
            code: 400,
            description: "MESSAGE_DELETE_FORBIDDEN".into()
        })
        .is_fatal());
        assert!(SweepError::Remote(RemoteError::Protocol("bad".into())).is_fatal());
        assert!(SweepError::Aborted("declined".into()).is_fatal());
        assert!(SweepError::Configuration("page size".into()).is_fatal());
        assert!(SweepError::Remote(RemoteError::Endpoint("bad url".into())).is_fatal());
    }

    #[test]
    fn only_response_shape_errors_suggest_api_change() {
        assert!(SweepError::Remote(RemoteError::Protocol("no result".into())).suggests_api_change());
        assert!(!SweepError::Remote(RemoteError::Endpoint("bad url".into())).suggests_api_change());
        assert!(!SweepError::Configuration("page size".into()).suggests_api_change());
    }
}
