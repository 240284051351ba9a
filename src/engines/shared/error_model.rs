// Error model for the engine core: stable kinds, retryability, no hidden retries.

use serde::{Deserialize, Serialize};

/// Classification of a per-resource failure surfaced on `OverviewRow.error`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Auth,
    Network,
    RateLimit,
    Unknown,
}

impl ErrorType {
    /// Substring-based classification per the row enricher's error policy.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        const AUTH: [&str; 3] = ["auth", "permission", "forbidden"];
        const NETWORK: [&str; 3] = ["connection", "network", "timeout"];
        const RATE_LIMIT: [&str; 3] = ["rate", "throttle", "too many"];

        if AUTH.iter().any(|s| lower.contains(s)) {
            ErrorType::Auth
        } else if NETWORK.iter().any(|s| lower.contains(s)) {
            ErrorType::Network
        } else if RATE_LIMIT.iter().any(|s| lower.contains(s)) {
            ErrorType::RateLimit
        } else {
            ErrorType::Unknown
        }
    }

    pub fn retryable(self) -> bool {
        matches!(self, ErrorType::Network | ErrorType::RateLimit)
    }
}

/// Error kinds returned by the engine core. None are fatal to a batch operation;
/// callers decide whether a `Transport`/`Deadline` failure for one resource aborts
/// the whole request.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("plugin '{plugin}' does not implement '{operation}'")]
    Unimplemented { plugin: String, operation: String },

    #[error("plugin '{plugin}' exceeded deadline of {timeout_ms}ms")]
    Deadline { plugin: String, timeout_ms: u64 },

    #[error("operation cancelled")]
    Cancellation,

    #[error("transport error from '{plugin}': {message}")]
    Transport {
        plugin: String,
        message: String,
        #[serde(skip)]
        kind: ErrorTypeWire,
    },

    #[error("resources carry mixed currencies")]
    MixedCurrencies,

    #[error("no pricing information available for '{resource_id}'")]
    MissingPricing { resource_id: String },
}

/// `ErrorType` is not `Default`; this newtype lets `Transport` derive `Serialize`
/// without requiring callers to supply a classification up front.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorTypeWire(pub Option<ErrorType>);

impl EngineError {
    pub fn transport(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = ErrorType::classify(&message);
        Self::Transport {
            plugin: plugin.into(),
            message,
            kind: ErrorTypeWire(Some(kind)),
        }
    }

    /// Classification used for `OverviewRow.error`; non-transport variants map to
    /// `Unknown` since they are not the substring-classified RPC failures §4.D
    /// describes.
    pub fn classify(&self) -> ErrorType {
        match self {
            EngineError::Transport { kind, .. } => kind.0.unwrap_or(ErrorType::Unknown),
            _ => ErrorType::Unknown,
        }
    }

    pub fn retryable(&self) -> bool {
        self.classify().retryable()
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Truncate a message to at most `max_bytes`, never splitting a UTF-8 character.
pub fn truncate_message(message: &str, max_bytes: usize) -> String {
    if message.len() <= max_bytes {
        return message.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_auth_before_network() {
        assert_eq!(ErrorType::classify("Forbidden: no permission"), ErrorType::Auth);
        assert_eq!(ErrorType::classify("connection reset"), ErrorType::Network);
        assert_eq!(ErrorType::classify("rate limited, too many requests"), ErrorType::RateLimit);
        assert_eq!(ErrorType::classify("unexpected nil pointer"), ErrorType::Unknown);
    }

    #[test]
    fn retryable_matches_network_and_rate_limit_only() {
        assert!(ErrorType::Network.retryable());
        assert!(ErrorType::RateLimit.retryable());
        assert!(!ErrorType::Auth.retryable());
        assert!(!ErrorType::Unknown.retryable());
    }

    #[test]
    fn truncate_never_splits_multibyte_chars() {
        let s = "héllo wörld";
        for n in 0..=s.len() {
            let t = truncate_message(s, n);
            assert!(t.len() <= n);
            assert!(std::str::from_utf8(t.as_bytes()).is_ok());
        }
    }
}
