//! CLI configuration: a thin wrapper around `netbridge_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--api-url, --token, --profile).

use secrecy::SecretString;

use netbridge_core::SessionConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use netbridge_config::{Config, Defaults, Profile, config_path, load_config, save_config};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Comma-separated profile names for diagnostics.
pub fn available_profiles(config: &Config) -> String {
    let names = config.profile_names();
    if names.is_empty() {
        "(none)".into()
    } else {
        names.join(", ")
    }
}

/// Build a `SessionConfig` from the config file, active profile, and CLI
/// overrides.
///
/// Without a matching profile, `--api-url` (and a token) alone are enough.
pub fn resolve_session_config(global: &GlobalOpts) -> Result<SessionConfig, CliError> {
    let cfg = load_config()?;
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None => {
            let Some(url) = global.api_url.as_deref() else {
                return Err(if global.profile.is_some() {
                    CliError::ProfileNotFound {
                        name: profile_name,
                        available: available_profiles(&cfg),
                    }
                } else {
                    CliError::NoConfig {
                        path: config_path().display().to_string(),
                    }
                });
            };
            Profile::new(url)
        }
    };

    // 1. API URL (flag > env > profile)
    if let Some(ref url) = global.api_url {
        profile.api_url.clone_from(url);
    }

    // 2. Token (flag > env > profile chain)
    let token = match global.token {
        Some(ref token) => SecretString::from(token.clone()),
        None => netbridge_config::resolve_token(&profile, &profile_name)?,
    };

    Ok(netbridge_config::session_config(&profile, Some(token))?)
}
