//! Profile configuration for chorus sync clients.
//!
//! TOML profiles, access-token resolution (env + plaintext), and
//! translation to `chorus_core::SyncConfig` / `SessionCredentials`.
//! The core never reads files; applications load a profile here and hand
//! the result in.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use chorus_core::{CoreError, EntityId, SessionCredentials, SyncConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("no access token configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<ConfigError> for CoreError {
    fn from(err: ConfigError) -> Self {
        CoreError::Config {
            message: err.to_string(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named explicitly.
    pub default_profile: Option<String>,

    /// Defaults applied to every profile.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named session profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_typing_ttl")]
    pub typing_indicator_ttl_secs: u64,

    #[serde(default = "default_sweep_interval")]
    pub typing_sweep_interval_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            typing_indicator_ttl_secs: default_typing_ttl(),
            typing_sweep_interval_ms: default_sweep_interval(),
        }
    }
}

fn default_page_size() -> u32 {
    50
}
fn default_typing_ttl() -> u64 {
    8
}
fn default_sweep_interval() -> u64 {
    1000
}

/// A named session profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Communication service endpoint (e.g., "https://chat.example.com").
    pub endpoint: String,

    /// Identity of the signed-in user.
    pub user_id: String,

    pub display_name: Option<String>,

    /// Access token (plaintext; prefer `token_env`).
    pub token: Option<String>,

    /// Environment variable name containing the access token.
    pub token_env: Option<String>,

    /// Override page size.
    pub page_size: Option<u32>,

    /// Override typing indicator lifetime.
    pub typing_indicator_ttl_secs: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "chorus", "chorus").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("chorus");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Environment variables use the `CHORUS_` prefix and `__` as the key
/// separator, e.g. `CHORUS_DEFAULTS__PAGE_SIZE=20`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CHORUS_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    debug!(path = %path.display(), "config saved");
    Ok(())
}

// ── Profile selection ───────────────────────────────────────────────

impl Config {
    /// Look up `name`, or the default profile when `name` is `None`.
    pub fn profile<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|profile| (name, profile))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the access token: the env var named by `token_env` first,
/// then the plaintext `token`.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
        debug!(profile = profile_name, var = %env_name, "token env var not set");
    }

    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Build the endpoint + token pair used to construct the SDK session.
pub fn profile_to_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<SessionCredentials, ConfigError> {
    let endpoint: url::Url = profile
        .endpoint
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "endpoint".into(),
            reason: format!("invalid URL: {}", profile.endpoint),
        })?;

    Ok(SessionCredentials {
        endpoint,
        token: resolve_token(profile, profile_name)?,
    })
}

/// Build a `SyncConfig` from a profile, falling back to `defaults`.
pub fn profile_to_sync_config(profile: &Profile, defaults: &Defaults) -> Result<SyncConfig, ConfigError> {
    if profile.user_id.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "user_id".into(),
            reason: "must not be empty".into(),
        });
    }
    let page_size = profile.page_size.unwrap_or(defaults.page_size);
    if page_size == 0 {
        return Err(ConfigError::Validation {
            field: "page_size".into(),
            reason: "must be at least 1".into(),
        });
    }

    Ok(SyncConfig {
        user_id: EntityId::from(profile.user_id.as_str()),
        display_name: profile.display_name.clone(),
        page_size,
        typing_indicator_ttl: Duration::from_secs(
            profile
                .typing_indicator_ttl_secs
                .unwrap_or(defaults.typing_indicator_ttl_secs),
        ),
        typing_sweep_interval: Duration::from_millis(defaults.typing_sweep_interval_ms),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    const SAMPLE: &str = r#"
default_profile = "work"

[defaults]
page_size = 20

[profiles.work]
endpoint = "https://chat.example.com"
user_id = "alice"
display_name = "Alice"
token = "plain-token"

[profiles.home]
endpoint = "not a url"
user_id = "alice-home"
typing_indicator_ttl_secs = 3
"#;

    fn write_sample(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        path
    }

    #[test]
    fn loads_profiles_and_defaults_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&write_sample(&dir)).unwrap();

        assert_eq!(config.default_profile.as_deref(), Some("work"));
        assert_eq!(config.defaults.page_size, 20);
        assert_eq!(config.defaults.typing_indicator_ttl_secs, 8);
        assert_eq!(config.profiles.len(), 2);

        let (name, profile) = config.profile(None).unwrap();
        assert_eq!(name, "work");
        assert_eq!(profile.user_id, "alice");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.defaults.page_size, 50);
        assert!(config.profiles.is_empty());
        assert!(matches!(
            config.profile(None),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn profile_translates_to_sync_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&write_sample(&dir)).unwrap();

        let (_, work) = config.profile(Some("work")).unwrap();
        let sync = profile_to_sync_config(work, &config.defaults).unwrap();
        assert_eq!(sync.user_id, EntityId::from("alice"));
        assert_eq!(sync.display_name.as_deref(), Some("Alice"));
        assert_eq!(sync.page_size, 20);
        assert_eq!(sync.typing_indicator_ttl, Duration::from_secs(8));

        let (_, home) = config.profile(Some("home")).unwrap();
        let sync = profile_to_sync_config(home, &config.defaults).unwrap();
        assert_eq!(sync.typing_indicator_ttl, Duration::from_secs(3));
    }

    #[test]
    fn credentials_require_a_valid_endpoint_and_token() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&write_sample(&dir)).unwrap();

        let (name, work) = config.profile(Some("work")).unwrap();
        let creds = profile_to_credentials(work, name).unwrap();
        assert_eq!(creds.endpoint.as_str(), "https://chat.example.com/");
        assert_eq!(creds.token.expose_secret(), "plain-token");

        let (name, home) = config.profile(Some("home")).unwrap();
        assert!(matches!(
            profile_to_credentials(home, name),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn token_env_takes_precedence_over_plaintext() {
        let Ok(path_value) = std::env::var("PATH") else {
            return;
        };
        let mut profile = Profile {
            endpoint: "https://chat.example.com".into(),
            user_id: "alice".into(),
            display_name: None,
            token: Some("plain-token".into()),
            token_env: Some("PATH".into()),
            page_size: None,
            typing_indicator_ttl_secs: None,
        };
        assert_eq!(resolve_token(&profile, "p").unwrap().expose_secret(), path_value);

        profile.token_env = Some("CHORUS_TEST_TOKEN_THAT_IS_NEVER_SET".into());
        assert_eq!(
            resolve_token(&profile, "p").unwrap().expose_secret(),
            "plain-token"
        );

        profile.token = None;
        assert!(matches!(
            resolve_token(&profile, "p"),
            Err(ConfigError::NoCredentials { .. })
        ));
    }

    #[test]
    fn empty_user_id_is_rejected() {
        let profile = Profile {
            endpoint: "https://chat.example.com".into(),
            user_id: "  ".into(),
            display_name: None,
            token: None,
            token_env: None,
            page_size: None,
            typing_indicator_ttl_secs: None,
        };
        let err = profile_to_sync_config(&profile, &Defaults::default()).unwrap_err();
        let core: CoreError = err.into();
        assert!(matches!(core, CoreError::Config { .. }));
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.profiles.insert(
            "default".into(),
            Profile {
                endpoint: "https://chat.example.com".into(),
                user_id: "bob".into(),
                display_name: Some("Bob".into()),
                token: None,
                token_env: Some("CHAT_TOKEN".into()),
                page_size: Some(10),
                typing_indicator_ttl_secs: None,
            },
        );

        save_config_to(&config, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        let (name, profile) = loaded.profile(None).unwrap();
        assert_eq!(name, "default");
        assert_eq!(profile.token_env.as_deref(), Some("CHAT_TOKEN"));
        assert_eq!(profile.page_size, Some(10));
    }
}
