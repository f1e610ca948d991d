// ── Core error types ──
//
// User-facing errors from chorus-core. Consumers never see the SDK error
// type directly: `CoreError::classify` maps an SDK failure onto the
// operation category it happened in.

use thiserror::Error;

use crate::model::OperationCategory;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Operation errors ─────────────────────────────────────────────
    #[error("{category} failed (transient): {message}")]
    TransientOperation {
        category: OperationCategory,
        message: String,
    },

    #[error("{category} failed: authentication required: {message}")]
    Authentication {
        category: OperationCategory,
        message: String,
    },

    #[error("{category} rejected by service: {message}")]
    Rejected {
        category: OperationCategory,
        message: String,
        /// Service-specific error code, if one was reported.
        code: Option<String>,
    },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Entity not found: {entity_type} with id {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    #[error("Invalid state transition: {message}")]
    InternalState { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    // ── Lifecycle / configuration ────────────────────────────────────
    #[error("Client has been disposed")]
    Disposed,

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Classify an SDK failure raised by an operation in `category`.
    pub fn classify(category: OperationCategory, err: &chorus_sdk::Error) -> Self {
        if err.is_not_found() {
            let identifier = match err {
                chorus_sdk::Error::NotFound { resource } => resource.clone(),
                other => other.to_string(),
            };
            return CoreError::NotFound {
                entity_type: category.to_string(),
                identifier,
            };
        }
        if err.is_auth_expired() {
            return CoreError::Authentication {
                category,
                message: err.to_string(),
            };
        }
        if err.is_transient() {
            return CoreError::TransientOperation {
                category,
                message: err.to_string(),
            };
        }
        CoreError::Rejected {
            category,
            message: err.to_string(),
            code: err.code().map(str::to_owned),
        }
    }

    /// The operation category this error was raised in, if any.
    pub fn category(&self) -> Option<OperationCategory> {
        match self {
            Self::TransientOperation { category, .. }
            | Self::Authentication { category, .. }
            | Self::Rejected { category, .. } => Some(*category),
            _ => None,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientOperation { .. })
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use chorus_sdk::Error;

    use super::*;

    #[test]
    fn classifies_sdk_failures() {
        let cat = OperationCategory::SendMessage;

        assert!(CoreError::classify(cat, &Error::Network("reset".into())).is_transient());
        assert!(CoreError::classify(cat, &Error::TokenExpired).is_authentication());
        assert!(
            CoreError::classify(
                cat,
                &Error::NotFound {
                    resource: "thread t9".into()
                }
            )
            .is_not_found()
        );

        let rejected = CoreError::classify(
            cat,
            &Error::Service {
                message: "too long".into(),
                code: Some("content.tooLong".into()),
                status: 400,
            },
        );
        match rejected {
            CoreError::Rejected { code, .. } => assert_eq!(code.as_deref(), Some("content.tooLong")),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn service_statuses_map_like_their_dedicated_variants() {
        let cat = OperationCategory::ListThreads;
        let unauthorized = Error::Service {
            message: "nope".into(),
            code: None,
            status: 401,
        };
        let unavailable = Error::Service {
            message: "busy".into(),
            code: None,
            status: 503,
        };
        assert!(CoreError::classify(cat, &unauthorized).is_authentication());
        assert!(CoreError::classify(cat, &unavailable).is_transient());
        assert_eq!(
            CoreError::classify(cat, &unavailable).category(),
            Some(OperationCategory::ListThreads)
        );
    }
}
