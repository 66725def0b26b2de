//! Configuration loading and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::locator::Locator;

/// Top-level bot configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<SiteConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub waits: Option<WaitsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Target page and the locators that describe its markup.
///
/// Every field has a default matching the current tradeit.gg layout, so a
/// config file only needs to list what changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub url: String,

    /// Present once the trading controls are rendered.
    pub ready: Locator,

    /// Every item in the bot inventory list.
    pub items: Locator,

    /// CSS template for a game filter option; `{game}` is replaced by the app id.
    pub game_option: String,

    /// Class carried by the currently active game option.
    pub active_game_class: String,

    pub search_input: Locator,

    /// Shown instead of the list when a filter matches nothing.
    pub empty_marker: Locator,

    /// Bundle expander inside an item.
    pub multiplier: Locator,

    pub fields: FieldLocators,
}

/// Item-scoped locators, one per record field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldLocators {
    pub name_attribute: String,
    pub game_attribute: String,
    pub float: Locator,
    pub paint: Locator,
    pub price: Locator,
    pub wear: Locator,
    pub stattrak: Locator,
    pub locked: Locator,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            url: "https://tradeit.gg/".into(),
            ready: Locator::css("#trading-steps"),
            items: Locator::css("#sinv-loader li"),
            game_option: r#"#bot-inv-column li[game="{game}"]"#.into(),
            active_game_class: "sactive-game".into(),
            search_input: Locator::css("#ssearch"),
            empty_marker: Locator::css("#sinv-empty"),
            multiplier: Locator::css(r#"div[class="multiplier"]"#),
            fields: FieldLocators::default(),
        }
    }
}

impl Default for FieldLocators {
    fn default() -> Self {
        Self {
            name_attribute: "data-original-title".into(),
            game_attribute: "data-appid".into(),
            float: Locator::parent_of_text("div", "span", "Float"),
            paint: Locator::parent_of_text("div", "span", "Paint"),
            price: Locator::css(r#"span[class="pricetext"]"#),
            wear: Locator::css(r#"div[class="quality"]"#),
            stattrak: Locator::css(r#"div[class="stattrak"]"#),
            locked: Locator::css(r#"div[class="bot-icon"]"#),
        }
    }
}

impl SiteConfig {
    /// Locator for the filter option of `game`.
    pub fn game_option(&self, game: &str) -> Locator {
        let escaped = game.replace('\\', "\\\\").replace('"', "\\\"");
        Locator::Css(self.game_option.replace("{game}", &escaped))
    }
}

/// Wait bounds, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitsConfig {
    /// Bound for page readiness, clickability, and the empty-or-populated wait.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Bound for the settle wait after an action. Running out is not an error.
    #[serde(default = "default_settle_timeout_ms")]
    pub settle_timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WaitsConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            settle_timeout_ms: default_settle_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_settle_timeout_ms() -> u64 {
    2_000
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl WaitsConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Browser launch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Path to Chrome/Chromium binary (auto-detected if omitted).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<String>,

    /// Run in headless mode (default: true).
    #[serde(default = "default_true")]
    pub headless: bool,

    /// CDP request timeout in ms (default: 30000).
    #[serde(default = "default_browser_timeout")]
    pub timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            timeout_ms: default_browser_timeout(),
        }
    }
}

impl BrowserConfig {
    /// `chrome_path` with a leading `~` expanded.
    pub fn chrome_executable(&self) -> Option<PathBuf> {
        self.chrome_path
            .as_deref()
            .map(|path| PathBuf::from(shellexpand::tilde(path).as_ref()))
    }
}

fn default_true() -> bool {
    true
}

fn default_browser_timeout() -> u64 {
    30_000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "tradeit_browser=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> crate::error::Result<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(anyhow::Error::from)?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_default()
        })
        .into_owned())
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config = Self::parse(&raw)?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Parse config from JSON5 text.
    pub fn parse(raw: &str) -> crate::error::Result<Self> {
        let substituted = substitute_env_vars(raw)?;
        json5::from_str(&substituted)
            .map_err(|e| crate::error::TradeitError::Config(e.to_string()))
    }

    /// Default config file location: `~/.tradeit/config.json`.
    pub fn default_path() -> PathBuf {
        data_dir().join("config.json")
    }

    /// Effective site layout.
    pub fn site(&self) -> SiteConfig {
        self.site.clone().unwrap_or_default()
    }

    /// Effective wait bounds.
    pub fn waits(&self) -> WaitsConfig {
        self.waits.clone().unwrap_or_default()
    }

    /// Effective browser launch settings.
    pub fn browser(&self) -> BrowserConfig {
        self.browser.clone().unwrap_or_default()
    }

    /// Get a config value by dotted path (e.g. "waits.settle_timeout_ms").
    ///
    /// Sections left out of the file resolve to their defaults.
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let effective = Config {
            site: Some(self.site()),
            waits: Some(self.waits()),
            browser: Some(self.browser()),
            logging: self.logging.clone(),
        };
        let json = serde_json::to_value(effective).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Set a config value by dotted path.
    pub fn set_path(&mut self, path: &str, value: serde_json::Value) -> anyhow::Result<()> {
        let mut json = serde_json::to_value(&*self)
            .map_err(|e| anyhow::anyhow!("Config serialization error: {e}"))?;

        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        let Some((last, parents)) = segments.split_last() else {
            anyhow::bail!("Empty path");
        };

        let mut current = &mut json;
        for segment in parents {
            if current.get(segment).is_none() {
                current[segment] = serde_json::json!({});
            }
            current = current
                .get_mut(segment)
                .ok_or_else(|| anyhow::anyhow!("Cannot descend into '{segment}'"))?;
        }
        current[last] = value;

        *self = serde_json::from_value(json)
            .map_err(|e| anyhow::anyhow!("Config deserialization error: {e}"))?;
        Ok(())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        let site = self.site();
        if site.url.trim().is_empty() {
            errors.push("site.url cannot be empty".to_string());
        }
        if !site.game_option.contains("{game}") {
            errors.push(format!(
                "site.game_option must contain a {{game}} placeholder, got '{}'",
                site.game_option
            ));
        }

        let waits = self.waits();
        if waits.default_timeout_ms == 0 {
            errors.push("waits.default_timeout_ms cannot be 0".to_string());
        }
        if waits.poll_interval_ms == 0 {
            errors.push("waits.poll_interval_ms cannot be 0".to_string());
        }
        if waits.settle_timeout_ms == 0 {
            warnings.push(
                "waits.settle_timeout_ms is 0; results will be read before the list re-renders"
                    .to_string(),
            );
        } else if waits.settle_timeout_ms >= waits.default_timeout_ms {
            warnings.push(format!(
                "waits.settle_timeout_ms ({}) is not shorter than waits.default_timeout_ms ({}); every search will idle for the full settle bound when nothing changes",
                waits.settle_timeout_ms, waits.default_timeout_ms
            ));
        }

        if let Some(path) = self.browser().chrome_executable() {
            if !path.exists() {
                errors.push(format!("Chrome binary not found: {}", path.display()));
            }
        }

        (warnings, errors)
    }

    /// Save config to a file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Base directory for bot data: `~/.tradeit/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tradeit")
}
