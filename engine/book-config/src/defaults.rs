//! Default configuration values loaded from config.defaults.toml.
//!
//! The defaults file is embedded at compile time so every binary carries
//! identical fallbacks no matter where it runs from.

use once_cell::sync::Lazy;
use serde::Deserialize;

/// The embedded defaults TOML file (loaded at compile time)
const DEFAULTS_TOML: &str = include_str!("../../../config.defaults.toml");

/// Parsed defaults structure (parsed once at first use)
static DEFAULTS: Lazy<DefaultsConfig> = Lazy::new(|| {
    toml::from_str(DEFAULTS_TOML).expect("config.defaults.toml should be valid TOML")
});

#[derive(Debug, Deserialize)]
struct DefaultsConfig {
    common: CommonDefaults,
    learning: LearningDefaults,
    trainer: TrainerDefaults,
    pack: PackDefaults,
}

#[derive(Debug, Deserialize)]
struct CommonDefaults {
    data_dir: String,
    log_level: String,
    tree_file: String,
}

#[derive(Debug, Deserialize)]
struct LearningDefaults {
    max_learn_depth: u32,
    min_trust_time: i32,
}

#[derive(Debug, Deserialize)]
struct TrainerDefaults {
    time_limit: i32,
    signal_file: String,
}

#[derive(Debug, Deserialize)]
struct PackDefaults {
    window: i16,
}

// ============================================================================
// Public accessors
// ============================================================================

pub fn data_dir() -> &'static str {
    &DEFAULTS.common.data_dir
}

pub fn log_level() -> &'static str {
    &DEFAULTS.common.log_level
}

pub fn tree_file() -> &'static str {
    &DEFAULTS.common.tree_file
}

pub fn max_learn_depth() -> u32 {
    DEFAULTS.learning.max_learn_depth
}

pub fn min_trust_time() -> i32 {
    DEFAULTS.learning.min_trust_time
}

pub fn time_limit() -> i32 {
    DEFAULTS.trainer.time_limit
}

pub fn signal_file() -> &'static str {
    &DEFAULTS.trainer.signal_file
}

pub fn window() -> i16 {
    DEFAULTS.pack.window
}
