use std::{collections::HashMap, fs, path::Path};

use anyhow::Context;

pub const SETTINGS_FILE: &str = "client_core.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub iam_prefix: String,
    pub api_prefix: String,
    pub state_channel_capacity: usize,
    pub menu_command_capacity: usize,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            iam_prefix: "iam:".into(),
            api_prefix: "api:".into(),
            state_channel_capacity: 64,
            menu_command_capacity: 32,
            log_filter: "info".into(),
        }
    }
}

/// Defaults, then `client_core.toml` in the working directory, then environment.
///
/// An unreadable or malformed file leaves the defaults in place and comes
/// back as the second value for the caller to log.
pub fn load_settings() -> (Settings, Option<anyhow::Error>) {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    path: &Path,
    var: impl Fn(&str) -> Option<String>,
) -> (Settings, Option<anyhow::Error>) {
    let mut settings = Settings::default();

    let file_error = match read_settings_file(path) {
        Ok(Some(file_cfg)) => {
            apply_file_settings(&mut settings, &file_cfg);
            None
        }
        Ok(None) => None,
        Err(err) => Some(err),
    };

    apply_env_overrides(&mut settings, var);
    (settings, file_error)
}

pub fn read_settings_file(path: &Path) -> anyhow::Result<Option<HashMap<String, String>>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
    let file_cfg = toml::from_str::<HashMap<String, String>>(&raw)
        .with_context(|| format!("failed to parse settings file '{}'", path.display()))?;
    Ok(Some(file_cfg))
}

pub fn apply_file_settings(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("iam_prefix") {
        settings.iam_prefix = v.clone();
    }
    if let Some(v) = file_cfg.get("api_prefix") {
        settings.api_prefix = v.clone();
    }
    if let Some(v) = file_cfg.get("state_channel_capacity") {
        set_capacity(&mut settings.state_channel_capacity, v);
    }
    if let Some(v) = file_cfg.get("menu_command_capacity") {
        set_capacity(&mut settings.menu_command_capacity, v);
    }
    if let Some(v) = file_cfg.get("log_filter") {
        settings.log_filter = v.clone();
    }
}

pub fn apply_env_overrides(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("APP__IAM_PREFIX") {
        settings.iam_prefix = v;
    }
    if let Some(v) = var("APP__API_PREFIX") {
        settings.api_prefix = v;
    }
    if let Some(v) = var("APP__STATE_CHANNEL_CAPACITY") {
        set_capacity(&mut settings.state_channel_capacity, &v);
    }
    if let Some(v) = var("APP__MENU_COMMAND_CAPACITY") {
        set_capacity(&mut settings.menu_command_capacity, &v);
    }

    if let Some(v) = var("RUST_LOG") {
        settings.log_filter = v;
    }
    if let Some(v) = var("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
}

fn set_capacity(target: &mut usize, raw: &str) {
    if let Ok(parsed) = raw.trim().parse::<usize>() {
        *target = parsed.max(1);
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
