use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/vimeoapi-env";
pub const DEFAULT_API_BASE: &str = "https://api.vimeo.com";
pub const DEFAULT_DIRECT_BASE: &str = "https://vimeo.com/api/v2";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const AUTOLOAD_FILE: &str = "autoload.php";

/// Plugin-wide settings. Every resolver and gateway call receives these
/// explicitly; nothing reads configuration from ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub caching: bool,
    pub display_origin: bool,
    /// Render origin markers as HTML spans instead of bracketed text.
    pub html_markers: bool,
    pub autoload_path: String,
    pub client_id: String,
    pub client_secret: String,
    pub access_token: String,
    pub direct_lookup: bool,
    pub legacy_quirks: bool,
    pub http_timeout_secs: u64,
    pub cache_db: Option<PathBuf>,
    pub api_base: String,
    pub direct_base: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            caching: true,
            display_origin: false,
            html_markers: false,
            autoload_path: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            access_token: String::new(),
            direct_lookup: true,
            legacy_quirks: false,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            cache_db: None,
            api_base: DEFAULT_API_BASE.to_string(),
            direct_base: DEFAULT_DIRECT_BASE.to_string(),
        }
    }
}

impl Settings {
    /// Normalizes the configured dependency path so it always points at
    /// `autoload.php` and returns it only when that file exists.
    pub fn resolve_autoload_path(&self) -> Option<PathBuf> {
        let trimmed = self.autoload_path.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return None;
        }
        let candidate = if trimmed.ends_with(AUTOLOAD_FILE) {
            PathBuf::from(trimmed)
        } else {
            Path::new(trimmed).join(AUTOLOAD_FILE)
        };
        candidate.is_file().then_some(candidate)
    }

    pub fn autoload_resolvable(&self) -> bool {
        self.resolve_autoload_path().is_some()
    }

    pub fn has_credentials(&self) -> bool {
        !self.access_token.is_empty()
            || (!self.client_id.is_empty() && !self.client_secret.is_empty())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }
}

pub fn read_env_config(path: &Path) -> Result<Option<Settings>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let mut cfg = Settings::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value_raw)) = trimmed.split_once('=') {
            let key = key.trim();
            let value = value_raw.trim().trim_matches('"');
            match key {
                "CACHING" => cfg.caching = parse_flag(key, value, path)?,
                "DISPLAY_ORIGIN" => cfg.display_origin = parse_flag(key, value, path)?,
                "HTML_MARKERS" => cfg.html_markers = parse_flag(key, value, path)?,
                "DIRECT_LOOKUP" => cfg.direct_lookup = parse_flag(key, value, path)?,
                "LEGACY_QUIRKS" => cfg.legacy_quirks = parse_flag(key, value, path)?,
                "AUTOLOAD_PATH" => cfg.autoload_path = value.to_string(),
                "CLIENT_ID" => cfg.client_id = value.to_string(),
                "CLIENT_SECRET" => cfg.client_secret = value.to_string(),
                "ACCESS_TOKEN" => cfg.access_token = value.to_string(),
                "HTTP_TIMEOUT_SECS" => {
                    cfg.http_timeout_secs = value.parse().with_context(|| {
                        format!("Parsing HTTP_TIMEOUT_SECS from {}", path.display())
                    })?;
                }
                "CACHE_DB" => {
                    if !value.is_empty() {
                        cfg.cache_db = Some(PathBuf::from(value));
                    }
                }
                "API_BASE" => {
                    if !value.is_empty() {
                        cfg.api_base = value.trim_end_matches('/').to_string();
                    }
                }
                "DIRECT_BASE" => {
                    if !value.is_empty() {
                        cfg.direct_base = value.trim_end_matches('/').to_string();
                    }
                }
                _ => {}
            }
        }
    }
    Ok(Some(cfg))
}

/// Reads the same settings from a TOML document with lowercase keys.
pub fn read_toml_config(path: &Path) -> Result<Option<Settings>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let cfg: Settings = toml::from_str(&content)
        .with_context(|| format!("Failed to deserialize contents of {}", path.display()))?;
    Ok(Some(cfg))
}

/// Loads settings from `path`, falling back to defaults when the file is
/// absent. Files ending in `.toml` are parsed as TOML, anything else as
/// `KEY=value` lines.
pub fn load_settings_from(path: impl AsRef<Path>) -> Result<Settings> {
    let path = path.as_ref();
    let parsed = if path.extension().and_then(|ext| ext.to_str()) == Some("toml") {
        read_toml_config(path)?
    } else {
        read_env_config(path)?
    };
    if parsed.is_none() {
        log::debug!("no config at {}, using defaults", path.display());
    }
    Ok(parsed.unwrap_or_default())
}

fn parse_flag(key: &str, value: &str, path: &Path) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("{key} in {} must be a boolean, got {other:?}", path.display()),
    }
}
