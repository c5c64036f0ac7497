//! Configuration for Visage.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::VisageResult;

/// Main configuration for Visage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Cache and retention settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Perceptual hash settings.
    #[serde(default)]
    pub perceptual: PerceptualConfig,

    /// Reference processor settings.
    #[serde(default)]
    pub processor: ProcessorConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Default timeout for a resolve operation (in seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_timeout() -> u64 {
    60
}

/// Cache and retention settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// SQLite database path.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Time to live for Success entries (in seconds).
    #[serde(default = "default_ttl_success")]
    pub ttl_success_secs: u64,

    /// Time to live for Failure entries (in seconds).
    /// Kept separate so operators tune how soon a cached failure is retried.
    #[serde(default = "default_ttl_failure")]
    pub ttl_failure_secs: u64,

    /// Retention for Failure entries before the sweep reclaims them.
    #[serde(default = "default_failure_retention")]
    pub failure_retention_secs: u64,

    /// Retention for entries that were never reused (hit_count == 0).
    #[serde(default = "default_stale_retention")]
    pub stale_retention_secs: u64,

    /// Interval between periodic sweeps (in seconds).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            ttl_success_secs: default_ttl_success(),
            ttl_failure_secs: default_ttl_failure(),
            failure_retention_secs: default_failure_retention(),
            stale_retention_secs: default_stale_retention(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl CacheConfig {
    /// TTL for Success entries as a `Duration`.
    pub fn ttl_success(&self) -> Duration {
        Duration::from_secs(self.ttl_success_secs)
    }

    /// TTL for Failure entries as a `Duration`.
    pub fn ttl_failure(&self) -> Duration {
        Duration::from_secs(self.ttl_failure_secs)
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".visage/visage.db")
}

fn default_ttl_success() -> u64 {
    86_400 // 24 hours
}

fn default_ttl_failure() -> u64 {
    3_600 // 1 hour
}

fn default_failure_retention() -> u64 {
    86_400
}

fn default_stale_retention() -> u64 {
    604_800 // 7 days
}

fn default_sweep_interval() -> u64 {
    3_600
}

/// Perceptual hash settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerceptualConfig {
    /// Enabled. When off, only the exact path is used.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Downsample grid size (pixels per side) before the DCT.
    #[serde(default = "default_grid_size")]
    pub grid_size: u32,

    /// Maximum Hamming distance for a similarity match, in absolute bits.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: u32,
}

impl Default for PerceptualConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            grid_size: default_grid_size(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_grid_size() -> u32 {
    32
}

fn default_similarity_threshold() -> u32 {
    10
}

/// Reference processor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Draw landmark points in the generated SVG.
    #[serde(default)]
    pub show_landmarks: bool,

    /// Opacity of region masks (0.0 to 1.0).
    #[serde(default = "default_region_opacity")]
    pub region_opacity: f64,

    /// Stroke width of region outlines.
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            show_landmarks: false,
            region_opacity: default_region_opacity(),
            stroke_width: default_stroke_width(),
        }
    }
}

fn default_region_opacity() -> f64 {
    0.7
}

fn default_stroke_width() -> f64 {
    1.5
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> VisageResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> VisageResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Creates default configuration.
    pub fn default_config() -> Self {
        Self {
            general: GeneralConfig::default(),
            cache: CacheConfig::default(),
            perceptual: PerceptualConfig::default(),
            processor: ProcessorConfig::default(),
        }
    }

    /// Tries to load configuration from current directory or uses default.
    pub fn load_or_default() -> Self {
        Self::load("visage.toml").unwrap_or_else(|_| Self::default_config())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
