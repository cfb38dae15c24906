//! Centralized configuration loading from config.toml.
//!
//! This crate provides the configuration structs and loading logic shared
//! by every Expbook binary.
//!
//! # Configuration Priority
//!
//! Settings are loaded with the following priority (highest to lowest):
//! 1. Environment variables (`EXPBOOK_<SECTION>_<KEY>`)
//! 2. config.toml file
//! 3. Built-in defaults (embedded from config.defaults.toml)
//!
//! # Environment Variable Override Pattern
//!
//! ```text
//! EXPBOOK_<SECTION>_<KEY>=value
//!
//! Examples:
//!     EXPBOOK_COMMON_DATA_DIR=/data
//!     EXPBOOK_COMMON_TREE_FILE=main.tree
//!     EXPBOOK_LEARNING_MAX_LEARN_DEPTH=40
//!     EXPBOOK_TRAINER_TIME_LIMIT=6000
//! ```

mod defaults;
mod loader;
mod structs;

pub use defaults::*;
pub use loader::{apply_env_overrides, load_config, load_from_path, CONFIG_SEARCH_PATHS};
pub use structs::*;

#[cfg(test)]
mod tests;
