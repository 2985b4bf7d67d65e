//! Editor configuration module.
//!
//! Handles loading, validating, and merging `resize-suite.toml`. Stock
//! defaults are the base layer; a user file in the config directory
//! overrides only the keys it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [history]
//! max_entries = 20          # Undo steps kept per editing session
//!
//! [limits]
//! allowed_types = ["image/jpeg", "image/png", "image/webp", "image/gif", "image/bmp", "image/tiff"]
//!
//! [limits.free]
//! max_file_size_mb = 10
//! max_files = 5             # Files per batch
//! max_dimension = 8000      # Longest edge, pixels
//!
//! [limits.pro]
//! max_file_size_mb = 50
//! max_files = 100
//! max_dimension = 20000
//!
//! [encoding]
//! quality = 92              # Default lossy quality (1-100)
//! background = "#ffffff"    # Flatten colour for formats without alpha
//!
//! [worker]
//! offload = "auto"          # never | always | auto
//! min_megapixels = 4.0      # auto: offload canvases at least this large
//!
//! [processing]
//! max_processes = 4         # Batch parallelism (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::enhanced::OffloadPolicy;
use crate::imaging::{ColorError, Quality, parse_hex_color};
use crate::validation::Tier;
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Config file name looked up in the config directory.
pub const CONFIG_FILE_NAME: &str = "resize-suite.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Editor configuration loaded from `resize-suite.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    /// Undo/redo history settings.
    pub history: HistoryConfig,
    /// Upload limits per tier.
    pub limits: LimitsConfig,
    /// Default encoder settings.
    pub encoding: EncodingConfig,
    /// Background worker offload.
    pub worker: WorkerConfig,
    /// Batch parallelism.
    pub processing: ProcessingConfig,
}

impl EditorConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history.max_entries == 0 {
            return Err(ConfigError::Validation(
                "history.max_entries must be at least 1".into(),
            ));
        }
        if !(1..=100).contains(&self.encoding.quality) {
            return Err(ConfigError::Validation(
                "encoding.quality must be 1-100".into(),
            ));
        }
        self.encoding
            .background_color()
            .map_err(|e| ConfigError::Validation(format!("encoding.background: {e}")))?;
        if self.limits.allowed_types.is_empty() {
            return Err(ConfigError::Validation(
                "limits.allowed_types must not be empty".into(),
            ));
        }
        for (name, tier) in [("free", &self.limits.free), ("pro", &self.limits.pro)] {
            if tier.max_file_size_mb == 0 || tier.max_files == 0 || tier.max_dimension == 0 {
                return Err(ConfigError::Validation(format!(
                    "limits.{name} values must be non-zero"
                )));
            }
        }
        if !(self.worker.min_megapixels.is_finite() && self.worker.min_megapixels >= 0.0) {
            return Err(ConfigError::Validation(
                "worker.min_megapixels must be a non-negative number".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    /// Oldest entries are evicted beyond this many.
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_entries: 20 }
    }
}

/// Upload limits: accepted MIME types plus per-tier caps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    pub allowed_types: Vec<String>,
    pub free: TierLimits,
    pub pro: TierLimits,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            allowed_types: [
                "image/jpeg",
                "image/png",
                "image/webp",
                "image/gif",
                "image/bmp",
                "image/tiff",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            free: TierLimits {
                max_file_size_mb: 10,
                max_files: 5,
                max_dimension: 8000,
            },
            pro: TierLimits {
                max_file_size_mb: 50,
                max_files: 100,
                max_dimension: 20000,
            },
        }
    }
}

impl LimitsConfig {
    pub fn for_tier(&self, tier: Tier) -> &TierLimits {
        match tier {
            Tier::Free => &self.free,
            Tier::Pro => &self.pro,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierLimits {
    pub max_file_size_mb: u64,
    pub max_files: usize,
    /// Longest edge in pixels.
    pub max_dimension: u32,
}

impl TierLimits {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingConfig {
    pub quality: u32,
    /// Hex colour transparent pixels are flattened onto.
    pub background: String,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            quality: 92,
            background: "#ffffff".to_string(),
        }
    }
}

impl EncodingConfig {
    pub fn quality(&self) -> Quality {
        Quality::new(self.quality)
    }

    pub fn background_color(&self) -> Result<Rgba<u8>, ColorError> {
        parse_hex_color(&self.background)
    }
}

/// When editing operations run on the background worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffloadMode {
    Never,
    Always,
    #[default]
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    pub offload: OffloadMode,
    /// Canvas size at which `auto` starts offloading.
    pub min_megapixels: f64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            offload: OffloadMode::Auto,
            min_megapixels: 4.0,
        }
    }
}

impl WorkerConfig {
    pub fn policy(&self) -> OffloadPolicy {
        match self.offload {
            OffloadMode::Never => OffloadPolicy::Never,
            OffloadMode::Always => OffloadPolicy::Always,
            OffloadMode::Auto => OffloadPolicy::Auto {
                min_megapixels: self.min_megapixels,
            },
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel batch workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(EditorConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `resize-suite.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<EditorConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: EditorConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given directory, falling back to stock defaults.
pub fn load_config(dir: &Path) -> Result<EditorConfig, ConfigError> {
    let config = resolve_config(stock_defaults_value(), load_raw_config(dir)?)?;
    log::debug!("Loaded config from {}", dir.display());
    Ok(config)
}

/// Returns a fully-commented stock `resize-suite.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# ResizeSuite Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Undo history
# ---------------------------------------------------------------------------
[history]
# Undo steps kept per editing session. Oldest steps are dropped first.
max_entries = 20

# ---------------------------------------------------------------------------
# Upload limits
# ---------------------------------------------------------------------------
[limits]
# Accepted input types. Detected from file contents, not the extension.
allowed_types = [
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/bmp",
    "image/tiff",
]

[limits.free]
max_file_size_mb = 10
max_files = 5             # Files per batch
max_dimension = 8000      # Longest edge, pixels

[limits.pro]
max_file_size_mb = 50
max_files = 100
max_dimension = 20000

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
[encoding]
# Default quality for lossy formats (1 = worst, 100 = best).
quality = 92

# Transparent pixels are flattened onto this colour when the output format
# has no alpha channel (JPEG, BMP).
background = "#ffffff"

# ---------------------------------------------------------------------------
# Background worker
# ---------------------------------------------------------------------------
[worker]
# never  - always run operations inline
# always - always run operations on the worker thread
# auto   - use the worker for canvases of at least min_megapixels
offload = "auto"
min_megapixels = 4.0

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel batch workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
