use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context};
use serde::Deserialize;
use tracing::warn;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server_url: String,
    pub api_prefix: String,
    pub request_timeout_secs: u64,
    pub leaderboard_limit: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".into(),
            api_prefix: "/api".into(),
            request_timeout_secs: 30,
            leaderboard_limit: client_core::DEFAULT_LEADERBOARD_LIMIT,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    api_prefix: Option<String>,
    request_timeout_secs: Option<u64>,
    leaderboard_limit: Option<u32>,
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Server URL with the API prefix appended, e.g. `http://127.0.0.1:8000/api`.
    pub fn api_base_url(&self) -> anyhow::Result<String> {
        let url = self.server_root()?;
        let root = url.as_str().trim_end_matches('/');
        let prefix = self.api_prefix.trim_matches('/');
        if prefix.is_empty() {
            return Ok(root.to_string());
        }
        Ok(format!("{root}/{prefix}"))
    }

    pub fn server_root(&self) -> anyhow::Result<Url> {
        let url = Url::parse(self.server_url.trim())
            .with_context(|| format!("invalid server url '{}'", self.server_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("server url '{}' must use http or https", self.server_url);
        }
        Ok(url)
    }

    /// Absolute link for an image path served relative to the server root.
    pub fn image_link(&self, image_url: &str) -> String {
        self.server_root()
            .ok()
            .and_then(|root| root.join(image_url).ok())
            .map(String::from)
            .unwrap_or_else(|| image_url.to_string())
    }
}

pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new(DEFAULT_CONFIG_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the TOML file when present, then environment variables.
pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        let file_cfg: FileSettings = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
        if let Some(v) = file_cfg.server_url {
            settings.server_url = v;
        }
        if let Some(v) = file_cfg.api_prefix {
            settings.api_prefix = v;
        }
        match file_cfg.request_timeout_secs {
            Some(0) => warn!("ignoring request_timeout_secs = 0 in config file"),
            Some(v) => settings.request_timeout_secs = v,
            None => {}
        }
        if let Some(v) = file_cfg.leaderboard_limit {
            settings.leaderboard_limit = v;
        }
    }

    if let Some(v) = env("SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = env("APP__API_PREFIX") {
        settings.api_prefix = v;
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        match v.parse::<u64>() {
            Ok(parsed) if parsed > 0 => settings.request_timeout_secs = parsed,
            _ => warn!(value = %v, "ignoring invalid APP__REQUEST_TIMEOUT_SECS"),
        }
    }

    if let Some(v) = env("APP__LEADERBOARD_LIMIT") {
        match v.parse::<u32>() {
            Ok(parsed) => settings.leaderboard_limit = parsed,
            Err(_) => warn!(value = %v, "ignoring invalid APP__LEADERBOARD_LIMIT"),
        }
    }

    Ok(settings)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
