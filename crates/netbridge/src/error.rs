//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use netbridge_config::ConfigError;
use netbridge_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to the event stream at {url}: {reason}")]
    #[diagnostic(
        code(netbridge::connection_failed),
        help(
            "Check that the backend is running and reachable.\n\
             URL: {url}\n\
             Try: netbridge events watch -v"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("No session token configured for profile '{profile}'")]
    #[diagnostic(
        code(netbridge::no_credentials),
        help(
            "Store one with: netbridge config set-token --profile {profile}\n\
             Or set the NETBRIDGE_TOKEN environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(netbridge::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(netbridge::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: netbridge config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(netbridge::no_config),
        help(
            "Create one with: netbridge config init\n\
             Or pass --api-url and --token.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(netbridge::config))]
    Config { message: String },

    #[error("System keyring unavailable: {reason}")]
    #[diagnostic(
        code(netbridge::keyring),
        help("Use token_env or a plaintext token in the profile instead.")
    )]
    Keyring { reason: String },

    // ── Stream data ──────────────────────────────────────────────────
    #[error("Malformed event: {message}")]
    #[diagnostic(code(netbridge::malformed_event))]
    MalformedEvent { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON output failed: {0}")]
    #[diagnostic(code(netbridge::json))]
    Json(#[from] serde_json::Error),

    #[error("YAML output failed: {0}")]
    #[diagnostic(code(netbridge::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::NoCredentials { .. } | Self::Keyring { .. } => exit_code::AUTH,
            Self::ProfileNotFound { .. } | Self::NoConfig { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidEndpoint { url, reason } => CliError::Validation {
                field: "api_url".into(),
                reason: if url.is_empty() {
                    reason
                } else {
                    format!("{url}: {reason}")
                },
            },
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed {
                url: "(event stream)".into(),
                reason,
            },
            CoreError::StreamClosed { code, reason } => CliError::ConnectionFailed {
                url: "(event stream)".into(),
                reason: format!("closed with code {code}: {reason}"),
            },
            CoreError::MalformedEvent { message } => CliError::MalformedEvent { message },
            CoreError::Config { message } => CliError::Config { message },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound {
                name: profile,
                available: "(see: netbridge config profiles)".into(),
            },
            ConfigError::Keyring(reason) => CliError::Keyring { reason },
            ConfigError::Io(e) => CliError::Io(e),
            other @ (ConfigError::Serialization(_) | ConfigError::Figment(_)) => {
                CliError::Config {
                    message: other.to_string(),
                }
            }
        }
    }
}
