use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where a proxy failure came from. Only ever logged; the screen collapses
/// every failure into one generic alert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProxyErrorCategory {
    /// Malformed identifier, unknown room or rejected request.
    Config,
    /// Session missing or not allowed to act on the room.
    Auth,
    /// Transport failure, throttling or homeserver outage.
    Network,
    /// Local store failure.
    Storage,
    /// Payload could not be encoded or decoded.
    Serialization,
    /// Broken invariant inside the proxy.
    Internal,
}

/// Failure reported by a room proxy operation.
///
/// The screen never shows these details; they only reach the logs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct ProxyError {
    pub category: ProxyErrorCategory,
    /// Stable machine-readable code, e.g. `invalid_user_id`.
    pub code: String,
    pub message: String,
}

impl ProxyError {
    pub fn new(
        category: ProxyErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Error used when shared proxy state is unusable.
    pub fn poisoned(what: &str) -> Self {
        Self::new(
            ProxyErrorCategory::Internal,
            "poisoned_lock",
            format!("{what} lock poisoned"),
        )
    }
}

/// Bucket a homeserver HTTP status into a [`ProxyErrorCategory`].
pub fn classify_http_status(status: u16) -> ProxyErrorCategory {
    match status {
        401 | 403 => ProxyErrorCategory::Auth,
        408 | 429 => ProxyErrorCategory::Network,
        400..=499 => ProxyErrorCategory::Config,
        500..=599 => ProxyErrorCategory::Network,
        _ => ProxyErrorCategory::Internal,
    }
}
