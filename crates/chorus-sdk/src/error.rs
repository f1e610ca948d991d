use thiserror::Error;

/// Top-level error type for SDK operations.
///
/// Covers every failure mode the session SDK reports: authentication,
/// transport, service-side refusals, and malformed payloads.
/// `chorus-core` maps these into user-facing diagnostics.
#[derive(Debug, Clone, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Credential rejected (wrong token, revoked identity, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Access token expired and must be refreshed by the application.
    #[error("Access token expired -- re-authentication required")]
    TokenExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// Network failure (connection reset, DNS failure, etc.)
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Throttled by the service. Includes retry-after in seconds.
    #[error("Throttled -- retry after {retry_after_secs}s")]
    Throttled { retry_after_secs: u64 },

    // ── Service ─────────────────────────────────────────────────────
    /// The referenced resource no longer exists.
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// Structured refusal from the service.
    #[error("Service error (HTTP {status}): {message}")]
    Service {
        message: String,
        code: Option<String>,
        status: u16,
    },

    /// The realtime notification channel is closed.
    #[error("Realtime channel closed: {reason}")]
    ChannelClosed { reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// Payload could not be decoded, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates the credential is no longer
    /// accepted and retrying without a new one is pointless.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::TokenExpired)
            || matches!(self, Self::Service { status: 401 | 403, .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_)
            | Self::Timeout { .. }
            | Self::Throttled { .. }
            | Self::ChannelClosed { .. } => true,
            Self::Service { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Service { status: 404, .. })
    }

    /// Extract the service error code, if available.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
