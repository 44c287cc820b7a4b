//! Config subcommand handlers.

use std::collections::HashMap;

use dialoguer::{Input, Select};
use secrecy::SecretString;
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Defaults, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking the token.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);

    for name in cfg.profile_names() {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "api_url = \"{}\"", p.api_url);
        if p.token.is_some() {
            let _ = writeln!(out, "token = \"****\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        if let Some(ref user) = p.user_id {
            let _ = writeln!(out, "user_id = \"{user}\"");
        }
        if let Some(secs) = p.reconnect_delay_secs {
            let _ = writeln!(out, "reconnect_delay_secs = {secs}");
        }
        if let Some(capacity) = p.buffer_capacity {
            let _ = writeln!(out, "buffer_capacity = {capacity}");
        }
        if let Some(limit) = p.activity_limit {
            let _ = writeln!(out, "activity_limit = {limit}");
        }
    }

    out.trim_end().to_owned()
}

/// The config with secrets replaced, for structured output.
#[derive(Serialize)]
struct RedactedConfig<'a> {
    default_profile: Option<&'a str>,
    defaults: &'a Defaults,
    profiles: HashMap<&'a str, Profile>,
}

fn redact(cfg: &Config) -> RedactedConfig<'_> {
    RedactedConfig {
        default_profile: cfg.default_profile.as_deref(),
        defaults: &cfg.defaults,
        profiles: cfg
            .profiles
            .iter()
            .map(|(name, p)| {
                let mut p = p.clone();
                if p.token.is_some() {
                    p.token = Some("****".into());
                }
                (name.as_str(), p)
            })
            .collect(),
    }
}

#[derive(Serialize)]
struct ProfileInfo<'a> {
    name: &'a str,
    api_url: &'a str,
    default: bool,
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "API URL")]
    api_url: String,
    #[tabled(rename = "Default")]
    default: &'static str,
}

fn save_config(cfg: &Config) -> Result<(), CliError> {
    config::save_config(cfg)?;
    Ok(())
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_token() -> Result<SecretString, CliError> {
    let token = rpassword::prompt_password("Session token: ").map_err(prompt_err)?;
    if token.is_empty() {
        return Err(CliError::Validation {
            field: "token".into(),
            reason: "token cannot be empty".into(),
        });
    }
    Ok(SecretString::from(token))
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: "must be a positive number".into(),
    })
}

fn profile_not_found(name: String, cfg: &Config) -> CliError {
    CliError::ProfileNotFound {
        name,
        available: config::available_profiles(cfg),
    }
}

/// Apply `key = value` to a profile.
fn set_key(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key {
        "api_url" | "api-url" => {
            let previous = std::mem::replace(&mut profile.api_url, value);
            if let Err(e) = profile.api_url() {
                profile.api_url = previous;
                return Err(e.into());
            }
        }
        "token" => profile.token = Some(value),
        "token_env" | "token-env" => profile.token_env = Some(value),
        "user_id" | "user-id" => profile.user_id = Some(value),
        "reconnect_delay_secs" | "reconnect-delay-secs" => {
            profile.reconnect_delay_secs = Some(parse_number(key, &value)?);
        }
        "buffer_capacity" | "buffer-capacity" => {
            profile.buffer_capacity = Some(parse_number(key, &value)?);
        }
        "activity_limit" | "activity-limit" => {
            profile.activity_limit = Some(parse_number(key, &value)?);
        }
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!(
                    "unknown config key '{other}'. Valid keys: api_url, token, token_env, \
                     user_id, reconnect_delay_secs, buffer_capacity, activity_limit"
                ),
            });
        }
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            eprintln!("NetworkBridge CLI configuration");
            eprintln!("   Config path: {}\n", config_path.display());

            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default("default".into())
                .interact_text()
                .map_err(prompt_err)?;

            let mut profile = Profile::new(
                Input::<String>::new()
                    .with_prompt("REST API URL")
                    .default("http://10.0.2.2:8080/api/".into())
                    .interact_text()
                    .map_err(prompt_err)?,
            );
            profile.api_url()?;

            let token = prompt_token()?;
            let choices = &[
                "Store in system keyring (recommended)",
                "Save to config file (plaintext)",
            ];
            let selection = Select::new()
                .with_prompt("Where to store the token?")
                .items(choices)
                .default(0)
                .interact()
                .map_err(prompt_err)?;
            if selection == 0 {
                netbridge_config::store_token(&profile_name, &token)?;
                eprintln!("   ✓ token stored in system keyring");
            } else {
                use secrecy::ExposeSecret;
                profile.token = Some(token.expose_secret().to_owned());
            }

            let user_id: String = Input::new()
                .with_prompt("User id (optional)")
                .allow_empty(true)
                .interact_text()
                .map_err(prompt_err)?;
            if !user_id.is_empty() {
                profile.user_id = Some(user_id);
            }

            let mut profiles = HashMap::new();
            profiles.insert(profile_name.clone(), profile);
            let cfg = Config {
                default_profile: Some(profile_name.clone()),
                defaults: Defaults::default(),
                profiles,
            };
            save_config(&cfg)?;

            eprintln!("\n✓ Configuration written to {}", config_path.display());
            eprintln!("  Active profile: {profile_name}");
            eprintln!("\n  Test it: netbridge events watch");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let redacted = redact(&cfg);
            let out = output::render_single(
                &global.output,
                &redacted,
                |_| format_config_redacted(&cfg),
                |_| config::config_path().display().to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Set <key> <value> ───────────────────────────────────────
        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config()?;
            let profile_name = config::active_profile_name(global, &cfg);

            let profile = cfg.profiles.entry(profile_name.clone()).or_default();
            set_key(profile, &key, value)?;

            save_config(&cfg)?;
            eprintln!("✓ Set {key} on profile '{profile_name}'");
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: netbridge config init");
                return Ok(());
            }

            let default = cfg.default_profile.as_deref();
            let infos: Vec<ProfileInfo<'_>> = cfg
                .profile_names()
                .into_iter()
                .map(|name| ProfileInfo {
                    name,
                    api_url: &cfg.profiles[name].api_url,
                    default: Some(name) == default,
                })
                .collect();
            let out = output::render_list(
                &global.output,
                &infos,
                |p| ProfileRow {
                    name: p.name.into(),
                    api_url: p.api_url.into(),
                    default: if p.default { "*" } else { "" },
                },
                |p| p.name.into(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config()?;
            if !cfg.profiles.contains_key(&name) {
                return Err(profile_not_found(name, &cfg));
            }

            cfg.default_profile = Some(name.clone());
            save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        // ── SetToken ────────────────────────────────────────────────
        ConfigCommand::SetToken { profile } => {
            let cfg = config::load_config()?;
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(profile_not_found(profile_name, &cfg));
            }

            let token = prompt_token()?;
            netbridge_config::store_token(&profile_name, &token)?;
            eprintln!("✓ Token stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_token() -> Config {
        let mut profile = Profile::new("https://bridge.example.com/api/");
        profile.token = Some("s3cret".into());
        profile.activity_limit = Some(5);
        let mut cfg = Config::default();
        cfg.profiles.insert("home".into(), profile);
        cfg
    }

    #[test]
    fn redacted_text_masks_token() {
        let text = format_config_redacted(&config_with_token());
        assert!(text.contains("[profiles.home]"));
        assert!(text.contains("token = \"****\""));
        assert!(text.contains("activity_limit = 5"));
        assert!(!text.contains("s3cret"));
    }

    #[test]
    fn redacted_json_masks_token() {
        let cfg = config_with_token();
        let json = serde_json::to_string(&redact(&cfg)).unwrap();
        assert!(json.contains("****"));
        assert!(!json.contains("s3cret"));
    }

    #[test]
    fn set_key_parses_numbers_and_rejects_unknown_keys() {
        let mut profile = Profile::default();
        set_key(&mut profile, "buffer_capacity", "128".into()).unwrap();
        assert_eq!(profile.buffer_capacity, Some(128));

        let err = set_key(&mut profile, "reconnect_delay_secs", "soon".into()).unwrap_err();
        assert!(matches!(err, CliError::Validation { .. }));

        let err = set_key(&mut profile, "controller", "x".into()).unwrap_err();
        assert!(err.to_string().contains("controller"));
    }

    #[test]
    fn set_key_keeps_previous_url_when_invalid() {
        let mut profile = Profile::new("https://bridge.example.com/api/");
        let err = set_key(&mut profile, "api_url", "ftp://nope/".into()).unwrap_err();
        assert!(matches!(err, CliError::Validation { .. }));
        assert_eq!(profile.api_url, "https://bridge.example.com/api/");
    }
}
