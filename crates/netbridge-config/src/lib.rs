//! Shared configuration for NetworkBridge tools.
//!
//! TOML profiles, session token resolution (env + keyring + plaintext),
//! and translation to `netbridge_core::SessionConfig`. The CLI adds
//! `GlobalOpts`-aware wrappers on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use netbridge_core::{MAX_BUFFER_CAPACITY, SessionConfig};

/// Keyring service name under which session tokens are stored.
pub const KEYRING_SERVICE: &str = "netbridge";

/// Prefix for environment overrides of config keys.
pub const ENV_PREFIX: &str = "NETBRIDGE_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no session token configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("keyring error: {0}")]
    Keyring(String),

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

impl From<keyring::Error> for ConfigError {
    fn from(err: keyring::Error) -> Self {
        Self::Keyring(err.to_string())
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
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

impl Config {
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }

    /// Profile names, sorted.
    pub fn profile_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

/// A named backend profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// REST API base address (e.g., "https://bridge.example.com/api/").
    pub api_url: String,

    /// Session token (plaintext; prefer keyring or env var).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Environment variable name containing the session token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    /// Id of the logged-in user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Override the reconnect delay (seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconnect_delay_secs: Option<u64>,

    /// Override the per-subscriber event buffer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_capacity: Option<usize>,

    /// Override the number of recent-activity entries kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_limit: Option<usize>,
}

impl Profile {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Self::default()
        }
    }

    /// Parse and validate `api_url`.
    pub fn api_url(&self) -> Result<url::Url, ConfigError> {
        let url: url::Url = self.api_url.parse().map_err(|_| ConfigError::Validation {
            field: "api_url".into(),
            reason: format!("invalid URL: {}", self.api_url),
        })?;
        match url.scheme() {
            "http" | "https" | "ws" | "wss" => Ok(url),
            other => Err(ConfigError::Validation {
                field: "api_url".into(),
                reason: format!("unsupported scheme '{other}' (expected http or https)"),
            }),
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "netbridge", "netbridge").map_or_else(
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
    p.push("netbridge");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load Config from `path` + environment. A missing file yields defaults.
///
/// Environment keys nest with a double underscore:
/// `NETBRIDGE_PROFILES__HOME__API_URL` sets `profiles.home.api_url`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
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
    Ok(())
}

// ── Token resolution (without CLI flags) ────────────────────────────

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/token")
}

/// Resolve the session token from the credential chain (no CLI flag
/// step): profile `token_env` variable, then system keyring, then
/// plaintext `token`.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_token_from(
        profile,
        profile_name,
        |name| std::env::var(name).ok(),
        |user| {
            keyring::Entry::new(KEYRING_SERVICE, user)
                .and_then(|entry| entry.get_password())
                .ok()
        },
    )
}

fn resolve_token_from(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's token_env → env var lookup
    if let Some(value) = profile.token_env.as_deref().and_then(&env) {
        return Ok(SecretString::from(value));
    }

    // 2. System keyring
    if let Some(secret) = keyring(&keyring_user(profile_name)) {
        return Ok(SecretString::from(secret));
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a session token in the system keyring for `profile_name`.
pub fn store_token(profile_name: &str, token: &SecretString) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))?;
    entry.set_password(token.expose_secret())?;
    Ok(())
}

// ── Translation to runtime config ───────────────────────────────────

/// Build a `SessionConfig` from a profile and an already-resolved token.
pub fn session_config(
    profile: &Profile,
    token: Option<SecretString>,
) -> Result<SessionConfig, ConfigError> {
    let mut config = SessionConfig::new(profile.api_url()?);
    config.token = token;
    config.user_id.clone_from(&profile.user_id);

    if let Some(secs) = profile.reconnect_delay_secs {
        if secs == 0 {
            return Err(ConfigError::Validation {
                field: "reconnect_delay_secs".into(),
                reason: "must be at least 1".into(),
            });
        }
        config.reconnect_delay = Duration::from_secs(secs);
    }
    if let Some(capacity) = profile.buffer_capacity {
        if capacity == 0 || capacity > MAX_BUFFER_CAPACITY {
            return Err(ConfigError::Validation {
                field: "buffer_capacity".into(),
                reason: format!("must be between 1 and {MAX_BUFFER_CAPACITY}"),
            });
        }
        config.buffer_capacity = capacity;
    }
    if let Some(limit) = profile.activity_limit {
        config.activity_limit = limit;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn no_lookup(_: &str) -> Option<String> {
        None
    }

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert_eq!(config.defaults.output, "table");
        assert_eq!(config.defaults.color, "auto");
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let (_dir, path) = write_config("[profiles.home\napi_url = ");
        assert!(matches!(
            load_config_from(&path),
            Err(ConfigError::Figment(_))
        ));
    }

    #[test]
    fn parses_profiles() {
        let (_dir, path) = write_config(
            r#"
default_profile = "home"

[defaults]
output = "json"

[profiles.home]
api_url = "https://bridge.example.com/api/"
token_env = "HOME_TOKEN"
user_id = "u-42"
reconnect_delay_secs = 10
buffer_capacity = 128

[profiles.lab]
api_url = "http://10.0.2.2:8080/api/"
"#,
        );

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("home"));
        assert_eq!(config.defaults.output, "json");
        assert_eq!(config.defaults.color, "auto");
        assert_eq!(config.profile_names(), vec!["home", "lab"]);

        let home = config.profile("home").unwrap();
        assert_eq!(home.token_env.as_deref(), Some("HOME_TOKEN"));
        assert_eq!(home.reconnect_delay_secs, Some(10));
        assert_eq!(home.buffer_capacity, Some(128));
        assert!(matches!(
            config.profile("nope"),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn save_then_load_preserves_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        let mut profile = Profile::new("https://bridge.example.com/api/");
        profile.user_id = Some("u-1".into());
        config.profiles.insert("default".into(), profile);
        save_config_to(&config, &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("token"), "unset token must not be written");

        let loaded = load_config_from(&path).unwrap();
        let profile = loaded.profile("default").unwrap();
        assert_eq!(profile.api_url, "https://bridge.example.com/api/");
        assert_eq!(profile.user_id.as_deref(), Some("u-1"));
    }

    #[test]
    fn token_chain_prefers_env_then_keyring_then_plaintext() {
        let mut profile = Profile::new("https://bridge.example.com/api/");
        profile.token = Some("plain".into());
        profile.token_env = Some("MY_TOKEN".into());

        let env = |name: &str| (name == "MY_TOKEN").then(|| "from-env".to_owned());
        let keyring = |user: &str| (user == "home/token").then(|| "from-keyring".to_owned());

        let token = resolve_token_from(&profile, "home", env, keyring).unwrap();
        assert_eq!(token.expose_secret(), "from-env");

        let token = resolve_token_from(&profile, "home", no_lookup, keyring).unwrap();
        assert_eq!(token.expose_secret(), "from-keyring");

        let token = resolve_token_from(&profile, "home", no_lookup, no_lookup).unwrap();
        assert_eq!(token.expose_secret(), "plain");
    }

    #[test]
    fn token_env_is_ignored_when_variable_unset() {
        let mut profile = Profile::new("https://bridge.example.com/api/");
        profile.token_env = Some("UNSET".into());
        profile.token = Some("plain".into());

        let token = resolve_token_from(&profile, "p", no_lookup, no_lookup).unwrap();
        assert_eq!(token.expose_secret(), "plain");
    }

    #[test]
    fn missing_token_names_the_profile() {
        let profile = Profile::new("https://bridge.example.com/api/");
        let err = resolve_token_from(&profile, "lab", no_lookup, no_lookup).unwrap_err();
        assert_eq!(err.to_string(), "no session token configured for profile 'lab'");
    }

    #[test]
    fn session_config_applies_overrides() {
        let mut profile = Profile::new("http://10.0.2.2:8080/api/");
        profile.user_id = Some("u-9".into());
        profile.reconnect_delay_secs = Some(2);
        profile.buffer_capacity = Some(16);
        profile.activity_limit = Some(5);

        let config = session_config(&profile, Some(SecretString::from("t".to_owned()))).unwrap();
        assert_eq!(config.api_url.as_str(), "http://10.0.2.2:8080/api/");
        assert_eq!(config.user_id.as_deref(), Some("u-9"));
        assert_eq!(config.reconnect_delay, Duration::from_secs(2));
        assert_eq!(config.buffer_capacity, 16);
        assert_eq!(config.activity_limit, 5);
        assert!(config.token.is_some());
    }

    #[test]
    fn session_config_rejects_bad_values() {
        let profile = Profile::new("not a url");
        assert!(matches!(
            session_config(&profile, None),
            Err(ConfigError::Validation { ref field, .. }) if field == "api_url"
        ));

        let profile = Profile::new("ftp://bridge.example.com/api/");
        assert!(session_config(&profile, None).is_err());

        let mut profile = Profile::new("https://bridge.example.com/api/");
        profile.reconnect_delay_secs = Some(0);
        assert!(matches!(
            session_config(&profile, None),
            Err(ConfigError::Validation { ref field, .. }) if field == "reconnect_delay_secs"
        ));

        let mut profile = Profile::new("https://bridge.example.com/api/");
        profile.buffer_capacity = Some(0);
        assert!(session_config(&profile, None).is_err());

        for capacity in [MAX_BUFFER_CAPACITY + 1, (1usize << 62) + 1, usize::MAX] {
            let mut profile = Profile::new("https://bridge.example.com/api/");
            profile.buffer_capacity = Some(capacity);
            assert!(matches!(
                session_config(&profile, None),
                Err(ConfigError::Validation { ref field, .. }) if field == "buffer_capacity"
            ));
        }
    }

    #[test]
    fn session_config_keeps_odd_buffer_capacity() {
        let mut profile = Profile::new("https://bridge.example.com/api/");
        profile.buffer_capacity = Some(10);
        let config = session_config(&profile, None).unwrap();
        assert_eq!(config.buffer_capacity, 10);
        assert_eq!(config.stream_config().unwrap().buffer_capacity, 10);
    }
}
