use crate::forms::ValidationError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
const DEFAULT_PER_PAGE: u32 = 10;
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Connection settings for the library API
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ApiConfig {
    pub fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE)
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)
    }
}

/// Where and whether the bearer token survives restarts
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub token_file: Option<PathBuf>,
    #[serde(default)]
    pub persist: Option<bool>,
}

impl SessionConfig {
    pub fn persist(&self) -> bool {
        self.persist.unwrap_or(true)
    }

    /// Token file path; `~/.libra/token` unless configured.
    pub fn resolve_token_file(&self) -> Option<PathBuf> {
        self.token_file
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".libra").join("token")))
    }
}

/// Terminal presentation switches
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UiConfig {
    #[serde(default)]
    pub confirm_destructive: Option<bool>,
    #[serde(default)]
    pub notifications: Option<bool>,
    #[serde(default)]
    pub profile_menu: Option<bool>,
    #[serde(default)]
    pub assume_yes: Option<bool>,
}

impl UiConfig {
    pub fn confirm_destructive(&self) -> bool {
        self.confirm_destructive.unwrap_or(true)
    }

    pub fn notifications(&self) -> bool {
        self.notifications.unwrap_or(true)
    }

    pub fn profile_menu(&self) -> bool {
        self.profile_menu.unwrap_or(true)
    }

    pub fn assume_yes(&self) -> bool {
        self.assume_yes.unwrap_or(false)
    }
}

/// Main configuration structure. Every layered value is optional so a later
/// layer only overrides what it sets; defaults apply after merging.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

impl Config {
    /// Load configuration from default paths
    /// Priority: local (.libra/config.local.toml) > project (.libra/config.toml) > user (~/.libra/config.toml)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".libra").join("config.toml");
            if user_config.exists() {
                let user = Self::load_from(&user_config)?;
                config.merge(user);
            }
        }

        let project_config = Path::new(".libra").join("config.toml");
        if project_config.exists() {
            let project = Self::load_from(&project_config)?;
            config.merge(project);
        }

        // Should be gitignored
        let local_config = Path::new(".libra").join("config.local.toml");
        if local_config.exists() {
            let local = Self::load_from(&local_config)?;
            config.merge(local);
        }

        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Merge another config into this one (other takes priority)
    /// Values override only when set in `other`.
    pub fn merge(&mut self, other: Config) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.api.base_url, other.api.base_url);
        take(&mut self.api.per_page, other.api.per_page);
        take(&mut self.api.timeout_ms, other.api.timeout_ms);

        take(&mut self.session.token_file, other.session.token_file);
        take(&mut self.session.persist, other.session.persist);

        take(&mut self.ui.confirm_destructive, other.ui.confirm_destructive);
        take(&mut self.ui.notifications, other.ui.notifications);
        take(&mut self.ui.profile_menu, other.ui.profile_menu);
        take(&mut self.ui.assume_yes, other.ui.assume_yes);
    }

    /// Base URL with any trailing slash removed
    pub fn base_url(&self) -> &str {
        self.api
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    /// Validate configuration and return any errors found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let base_url = self.base_url();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            errors.push(ValidationError::new(
                "api.base_url",
                &format!("Must be an http(s) URL, got '{}'", base_url),
            ));
        }

        let per_page = self.api.per_page();
        if !(1..=100).contains(&per_page) {
            errors.push(ValidationError::new(
                "api.per_page",
                &format!("Must be between 1 and 100, got {}", per_page),
            ));
        }

        if self.api.timeout_ms() == 0 {
            errors.push(ValidationError::new(
                "api.timeout_ms",
                "Must be greater than 0",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
