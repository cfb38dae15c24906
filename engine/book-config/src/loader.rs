//! Configuration loading logic.
//!
//! Handles loading config from files and applying environment variable
//! overrides.

use crate::CentralConfig;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Standard locations to search for config.toml
pub const CONFIG_SEARCH_PATHS: &[&str] = &[
    "config.toml",    // Current directory
    "../config.toml", // Parent directory (when running from a subdirectory)
];

/// Load the central configuration from config.toml.
///
/// Searches for config.toml in the following order:
/// 1. Path specified by the EXPBOOK_CONFIG environment variable
/// 2. Current directory (config.toml)
/// 3. Parent directory (../config.toml)
///
/// After loading, environment variable overrides are applied.
pub fn load_config() -> CentralConfig {
    if let Ok(path) = std::env::var("EXPBOOK_CONFIG") {
        let path = PathBuf::from(&path);
        if path.exists() {
            info!("Loading config from EXPBOOK_CONFIG: {}", path.display());
            return load_from_path(&path);
        }
        warn!(
            "EXPBOOK_CONFIG={} not found, searching defaults",
            path.display()
        );
    }

    for path_str in CONFIG_SEARCH_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading config from {}", path.display());
            return load_from_path(&path);
        }
    }

    debug!("No config.toml found, using built-in defaults");
    apply_env_overrides(CentralConfig::default())
}

/// Load configuration from a specific path.
pub fn load_from_path(path: &PathBuf) -> CentralConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => apply_env_overrides(config),
            Err(e) => {
                warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                apply_env_overrides(CentralConfig::default())
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}, using defaults", path.display(), e);
            apply_env_overrides(CentralConfig::default())
        }
    }
}

/// Macro to reduce env override boilerplate
macro_rules! env_override {
    // String field
    ($config:expr, $section:ident . $field:ident, $key:expr) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = v;
        }
    };
    // Parseable field (i32, u32, i16, etc.)
    ($config:expr, $section:ident . $field:ident, $key:expr, parse) => {
        if let Ok(v) =
            std::env::var($key).and_then(|s| s.parse().map_err(|_| std::env::VarError::NotPresent))
        {
            $config.$section.$field = v;
        }
    };
}

/// Apply environment variable overrides to a configuration.
///
/// Environment variables follow the pattern: EXPBOOK_<SECTION>_<KEY>
pub fn apply_env_overrides(mut config: CentralConfig) -> CentralConfig {
    // Common
    env_override!(config, common.data_dir, "EXPBOOK_COMMON_DATA_DIR");
    env_override!(config, common.log_level, "EXPBOOK_COMMON_LOG_LEVEL");
    env_override!(config, common.tree_file, "EXPBOOK_COMMON_TREE_FILE");

    // Learning
    env_override!(
        config,
        learning.max_learn_depth,
        "EXPBOOK_LEARNING_MAX_LEARN_DEPTH",
        parse
    );
    env_override!(
        config,
        learning.min_trust_time,
        "EXPBOOK_LEARNING_MIN_TRUST_TIME",
        parse
    );

    // Trainer
    env_override!(
        config,
        trainer.time_limit,
        "EXPBOOK_TRAINER_TIME_LIMIT",
        parse
    );
    env_override!(config, trainer.signal_file, "EXPBOOK_TRAINER_SIGNAL_FILE");

    // Pack
    env_override!(config, pack.window, "EXPBOOK_PACK_WINDOW", parse);

    config
}
