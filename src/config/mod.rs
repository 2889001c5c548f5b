use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "transcript-grabber";
const LOCAL_CONFIG: &str = "transcript-grabber.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Browser launch settings
    pub browser: BrowserSettings,

    /// Per-video extraction timing and retry settings
    pub extraction: ExtractionSettings,

    /// Batch run settings
    pub batch: BatchSettings,
}

/// Chromium-family browsers that speak the DevTools protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BrowserEngine {
    #[default]
    Chromium,
    Chrome,
    Edge,
}

impl BrowserEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserEngine::Chromium => "chromium",
            BrowserEngine::Chrome => "chrome",
            BrowserEngine::Edge => "edge",
        }
    }

    /// Binary names to look for on PATH
    pub fn executable_names(&self) -> &'static [&'static str] {
        match self {
            BrowserEngine::Chromium => &["chromium", "chromium-browser"],
            BrowserEngine::Chrome => &["google-chrome", "google-chrome-stable", "chrome"],
            BrowserEngine::Edge => &["microsoft-edge", "microsoft-edge-stable", "msedge"],
        }
    }
}

impl std::fmt::Display for BrowserEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run without a visible window
    pub headless: bool,

    /// Which browser to launch
    pub engine: BrowserEngine,

    /// Explicit browser binary, skips PATH lookup
    pub executable_path: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            engine: BrowserEngine::Chromium,
            executable_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Page load budget, also used as the CDP request timeout
    pub per_stage_timeout_ms: u64,

    /// Wait for the transcript panel to render segments
    pub panel_timeout_ms: u64,

    /// Wait for the "Show transcript" control to appear
    pub reveal_timeout_ms: u64,

    /// Wait for the description expander to appear
    pub expander_timeout_ms: u64,

    /// Pause after every click
    pub inter_action_delay_ms: u64,

    /// Extra attempts for a stage that fails with a browser error
    pub max_retries: u32,

    pub retry_delay_ms: u64,

    pub max_retry_delay_ms: u64,

    pub exponential_backoff: bool,

    /// Hard ceiling for one whole video
    pub video_timeout_ms: u64,

    pub poll_interval_ms: u64,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            per_stage_timeout_ms: 30_000,
            panel_timeout_ms: 5_000,
            reveal_timeout_ms: 15_000,
            expander_timeout_ms: 5_000,
            inter_action_delay_ms: 100,
            max_retries: 2,
            retry_delay_ms: 1_000,
            max_retry_delay_ms: 8_000,
            exponential_backoff: true,
            video_timeout_ms: 120_000,
            poll_interval_ms: 250,
        }
    }
}

impl ExtractionSettings {
    pub fn per_stage_timeout(&self) -> Duration {
        Duration::from_millis(self.per_stage_timeout_ms)
    }

    pub fn video_timeout(&self) -> Duration {
        Duration::from_millis(self.video_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Videos extracted at the same time, each in its own browser context
    pub max_concurrency: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { max_concurrency: 2 }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            if let Err(e) = config.save_to(&config_path) {
                tracing::debug!("Could not write default config: {:#}", e);
            }
            Ok(config)
        }
    }

    /// Load and validate a specific config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        let config: Config =
            serde_yaml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub async fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let local_config = PathBuf::from(LOCAL_CONFIG);
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join(APP_DIR).join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let e = &self.extraction;
        let timeouts = [
            ("per_stage_timeout_ms", e.per_stage_timeout_ms),
            ("panel_timeout_ms", e.panel_timeout_ms),
            ("reveal_timeout_ms", e.reveal_timeout_ms),
            ("expander_timeout_ms", e.expander_timeout_ms),
            ("video_timeout_ms", e.video_timeout_ms),
            ("poll_interval_ms", e.poll_interval_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                anyhow::bail!("extraction.{} must be greater than zero", name);
            }
        }

        if self.batch.max_concurrency == 0 {
            anyhow::bail!("batch.max_concurrency must be at least 1");
        }

        if let Some(path) = &self.browser.executable_path {
            if path.as_os_str().is_empty() {
                anyhow::bail!("browser.executable_path must not be empty");
            }
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Browser: {}", self.browser.engine);
        println!("  Headless: {}", self.browser.headless);
        if let Some(path) = &self.browser.executable_path {
            println!("  Executable: {}", path.display());
        }
        let e = &self.extraction;
        println!("  Page Load Timeout: {} ms", e.per_stage_timeout_ms);
        println!("  Reveal Timeout: {} ms", e.reveal_timeout_ms);
        println!("  Panel Timeout: {} ms", e.panel_timeout_ms);
        println!("  Expander Timeout: {} ms", e.expander_timeout_ms);
        println!("  Inter-action Delay: {} ms", e.inter_action_delay_ms);
        println!(
            "  Retries: {} ({} backoff from {} ms, max {} ms)",
            e.max_retries,
            if e.exponential_backoff { "exponential" } else { "fixed" },
            e.retry_delay_ms,
            e.max_retry_delay_ms
        );
        println!("  Per-video Ceiling: {} ms", e.video_timeout_ms);
        println!("  Batch Concurrency: {}", self.batch.max_concurrency);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.browser.headless);
        assert_eq!(config.extraction.max_retries, 2);
        assert_eq!(config.extraction.video_timeout(), Duration::from_secs(120));
        assert_eq!(config.batch.max_concurrency, 2);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str(
            "browser:\n  engine: edge\n  headless: false\nbatch:\n  max_concurrency: 4\n",
        )
        .unwrap();
        assert_eq!(config.browser.engine, BrowserEngine::Edge);
        assert!(!config.browser.headless);
        assert_eq!(config.batch.max_concurrency, 4);
        assert_eq!(config.extraction.panel_timeout_ms, 5_000);
    }

    #[test]
    fn test_zero_values_are_rejected() {
        let mut config = Config::default();
        config.extraction.reveal_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.batch.max_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.browser.engine = BrowserEngine::Chrome;
        config.extraction.max_retries = 5;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.browser.engine, BrowserEngine::Chrome);
        assert_eq!(loaded.extraction.max_retries, 5);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs_err::write(&path, "batch:\n  max_concurrency: 0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_engine_names() {
        assert_eq!(BrowserEngine::Edge.to_string(), "edge");
        assert!(BrowserEngine::Chrome
            .executable_names()
            .contains(&"google-chrome"));
    }
}
