use crate::clock::parse_utc_offset;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::UtcOffset;

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "AGENDA_CONFIG_PATH";

/// ANSI colours for agenda output. Empty codes disable colouring.
#[derive(Debug, Clone)]
pub struct Palette {
    pub alert: &'static str,
    pub muted: &'static str,
    pub reset: &'static str,
}

impl Palette {
    pub fn alert(&self, text: &str) -> String {
        self.paint(self.alert, text)
    }

    pub fn mute(&self, text: &str) -> String {
        self.paint(self.muted, text)
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if code.is_empty() {
            text.to_string()
        } else {
            format!("{code}{text}{}", self.reset)
        }
    }
}

pub fn palette_for_theme(theme: Option<&str>) -> Palette {
    match theme.map(canonical_theme_name).as_deref() {
        Some("noir") => Palette {
            alert: "\x1b[38;5;208m",
            muted: "\x1b[38;5;250m",
            reset: "\x1b[0m",
        },
        Some("solarized") => Palette {
            alert: "\x1b[38;5;160m",
            muted: "\x1b[38;5;245m",
            reset: "\x1b[0m",
        },
        _ => Palette {
            alert: "",
            muted: "",
            reset: "",
        },
    }
}

/// Lower-cases, folds punctuation runs into `_` and maps known aliases.
pub fn canonical_theme_name(raw: &str) -> String {
    let folded = fold_name(raw);
    match folded.as_str() {
        "" | "vanilla" | "light" => "default".to_string(),
        "dark" | "dark_mode" | "darkmode" => "noir".to_string(),
        _ => folded,
    }
}

/// Shared by theme names and override keys.
pub fn fold_name(raw: &str) -> String {
    let mut cleaned = String::new();
    let mut pending_separator = false;

    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !cleaned.is_empty() {
                cleaned.push('_');
            }
            cleaned.push(ch.to_ascii_lowercase());
            pending_separator = false;
        } else {
            pending_separator = true;
        }
    }

    cleaned
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub utc_offset: Option<String>,
    #[serde(default)]
    pub default_user: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
}

impl Config {
    /// Offset for reading local wall-clock values; `local` when unset.
    pub fn offset(&self) -> Result<UtcOffset, AppError> {
        parse_utc_offset(self.utc_offset.as_deref().unwrap_or("local"))
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub utc_offset: Option<String>,
    pub default_user: Option<String>,
    pub theme: Option<String>,
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("agenda").join(CONFIG_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("agenda")
            .join(CONFIG_FILE_NAME))
    }
}

pub fn load_config() -> Result<Config, AppError> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(Config::default());
    }
    load_config_from_path(&path)
}

/// Never fails: a broken config falls back to defaults and the error is
/// handed back for the caller to report.
pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "falling back to default config");
            ConfigLoad {
                config: Config::default(),
                error: Some(err),
            }
        }
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let mut config: Config = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;

    if let Some(offset) = config.utc_offset.as_deref() {
        parse_utc_offset(offset).map_err(|_| {
            AppError::invalid_data(format!(
                "utc_offset '{offset}' in {} is not a UTC offset",
                path.display()
            ))
        })?;
    }
    config.theme = config.theme.map(|theme| canonical_theme_name(&theme));
    Ok(config)
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Config {
    let mut merged = base.clone();
    if let Some(offset) = overrides.utc_offset.as_ref() {
        merged.utc_offset = Some(offset.trim().to_string());
    }
    if let Some(user) = overrides.default_user.as_ref() {
        merged.default_user = Some(user.trim().to_string());
    }
    if let Some(theme) = overrides.theme.as_ref() {
        merged.theme = Some(canonical_theme_name(theme));
    }
    merged
}
