//! Error taxonomy for do-snapshot.
//!
//! Ядро (due/policy/evaluator/simulate) возвращает только InvalidConfiguration и Invariant.
//! Остальные варианты приходят из коллабораторов (HTTP API) и пробрасываются без изменений.

/// The result type used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed interval/tier strings, negative thresholds, missing token, etc.
    /// Reported before any external call is made.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Connection failures, timeouts, HTTP 5xx and 429. Never retried here.
    #[error("transient network error: {message}")]
    TransientNetwork {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Missing or rejected credentials (HTTP 401/403).
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Any other 4xx response from the API.
    #[error("api call failed with status {status}: {body}")]
    Api { status: u16, body: String },

    /// The evaluator produced a decision that is not a partition of its input.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    pub fn transient(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::TransientNetwork {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Errors after which continuing with other subjects is pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration(_) | Self::Auth(_) | Self::Invariant(_)
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientNetwork { .. })
    }
}
