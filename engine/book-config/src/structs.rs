//! Configuration struct definitions.
//!
//! All config structs with serde deserialization support and default values.

use crate::defaults;
use serde::Deserialize;

// ============================================================================
// Serde default functions (required for #[serde(default = "...")])
// These call the accessor functions from the defaults module
// ============================================================================

fn d_data_dir() -> String {
    defaults::data_dir().into()
}
fn d_log_level() -> String {
    defaults::log_level().into()
}
fn d_tree_file() -> String {
    defaults::tree_file().into()
}
fn d_max_learn_depth() -> u32 {
    defaults::max_learn_depth()
}
fn d_min_trust_time() -> i32 {
    defaults::min_trust_time()
}
fn d_time_limit() -> i32 {
    defaults::time_limit()
}
fn d_signal_file() -> String {
    defaults::signal_file().into()
}
fn d_window() -> i16 {
    defaults::window()
}

/// Top-level configuration shared by all components.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CentralConfig {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default)]
    pub learning: LearningConfig,
    #[serde(default)]
    pub trainer: TrainerConfig,
    #[serde(default)]
    pub pack: PackConfig,
}

/// Settings shared by every binary.
#[derive(Debug, Clone, Deserialize)]
pub struct CommonConfig {
    /// Directory holding the tree file and any working files.
    #[serde(default = "d_data_dir")]
    pub data_dir: String,

    /// Default tracing filter when RUST_LOG is not set.
    #[serde(default = "d_log_level")]
    pub log_level: String,

    /// Tree file name inside `data_dir`.
    #[serde(default = "d_tree_file")]
    pub tree_file: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            data_dir: d_data_dir(),
            log_level: d_log_level(),
            tree_file: d_tree_file(),
        }
    }
}

/// Limits on what gets recorded and trusted.
#[derive(Debug, Clone, Deserialize)]
pub struct LearningConfig {
    /// Plies past this depth are never recorded.
    #[serde(default = "d_max_learn_depth")]
    pub max_learn_depth: u32,

    /// Minimum analysis investment (centiseconds) before a recorded line
    /// is trusted enough to be played from the book.
    #[serde(default = "d_min_trust_time")]
    pub min_trust_time: i32,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            max_learn_depth: d_max_learn_depth(),
            min_trust_time: d_min_trust_time(),
        }
    }
}

/// Trainer scheduling settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainerConfig {
    /// Analysis budget per position, in centiseconds.
    #[serde(default = "d_time_limit")]
    pub time_limit: i32,

    /// Sentinel file (inside `data_dir`) asking a running trainer to stop.
    #[serde(default = "d_signal_file")]
    pub signal_file: String,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            time_limit: d_time_limit(),
            signal_file: d_signal_file(),
        }
    }
}

/// Compaction settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PackConfig {
    /// Maximum absolute score a branch may carry for packing to keep its
    /// subtree.
    #[serde(default = "d_window")]
    pub window: i16,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            window: d_window(),
        }
    }
}
