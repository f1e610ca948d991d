// ── Runtime session configuration ──
//
// These types describe how the sync layer behaves for one signed-in user.
// They never touch disk: chorus-config (or the embedding application)
// builds them and hands them in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use chorus_sdk::EntityId;

/// Endpoint and access token used to construct the underlying SDK session.
///
/// The core never opens connections itself; this is carried so callers can
/// build their `SessionSdk` from the same resolved profile.
#[derive(Debug, Clone)]
pub struct SessionCredentials {
    pub endpoint: Url,
    pub token: SecretString,
}

/// Tuning for a [`SyncClient`](crate::SyncClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Identity of the local user. Used as sender of optimistic messages
    /// and to mark own messages in bindings.
    pub user_id: EntityId,
    pub display_name: Option<String>,
    /// Page size requested from paged listings.
    pub page_size: u32,
    /// Age after which a typing indicator is dropped.
    pub typing_indicator_ttl: Duration,
    /// How often the sweeper looks for expired typing indicators.
    pub typing_sweep_interval: Duration,
}

impl SyncConfig {
    pub fn new(user_id: impl Into<EntityId>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            user_id: EntityId::from("local-user"),
            display_name: None,
            page_size: 50,
            typing_indicator_ttl: Duration::from_secs(8),
            typing_sweep_interval: Duration::from_secs(1),
        }
    }
}
