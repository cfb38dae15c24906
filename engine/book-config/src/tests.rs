use crate::*;
use std::io::Write;

#[test]
fn defaults_match_embedded_file() {
    let config = CentralConfig::default();
    assert_eq!(config.common.data_dir, "./data");
    assert_eq!(config.common.tree_file, "experience.tree");
    assert_eq!(config.learning.max_learn_depth, 30);
    assert_eq!(config.learning.min_trust_time, 500);
    assert_eq!(config.trainer.time_limit, 1000);
    assert_eq!(config.trainer.signal_file, "trainer.close");
    assert_eq!(config.pack.window, 400);
}

#[test]
fn partial_toml_keeps_defaults_elsewhere() {
    let toml_str = r#"
        [learning]
        max_learn_depth = 12

        [pack]
        window = 250
    "#;
    let config: CentralConfig = toml::from_str(toml_str).unwrap();
    assert_eq!(config.learning.max_learn_depth, 12);
    assert_eq!(config.pack.window, 250);
    // Untouched sections fall back to defaults.
    assert_eq!(config.learning.min_trust_time, 500);
    assert_eq!(config.common.tree_file, "experience.tree");
    assert_eq!(config.trainer.time_limit, 1000);
}

#[test]
fn empty_toml_is_all_defaults() {
    let config: CentralConfig = toml::from_str("").unwrap();
    assert_eq!(config.common.data_dir, "./data");
    assert_eq!(config.trainer.time_limit, 1000);
}

#[test]
fn load_from_path_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "[common]\ntree_file = \"main.tree\"").unwrap();

    let config = load_from_path(&path);
    assert_eq!(config.common.tree_file, "main.tree");
    assert_eq!(config.common.data_dir, "./data");
}

#[test]
fn load_from_malformed_file_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is { not toml").unwrap();

    let config = load_from_path(&path);
    assert_eq!(config.common.tree_file, "experience.tree");
}

#[test]
fn env_overrides_apply() {
    // Each test uses its own variables to stay independent of test order.
    std::env::set_var("EXPBOOK_TRAINER_TIME_LIMIT", "6000");
    std::env::set_var("EXPBOOK_COMMON_TREE_FILE", "override.tree");
    let config = apply_env_overrides(CentralConfig::default());
    std::env::remove_var("EXPBOOK_TRAINER_TIME_LIMIT");
    std::env::remove_var("EXPBOOK_COMMON_TREE_FILE");

    assert_eq!(config.trainer.time_limit, 6000);
    assert_eq!(config.common.tree_file, "override.tree");
    assert_eq!(config.pack.window, 400, "untouched keys keep defaults");
}

#[test]
fn env_override_ignores_unparseable_numbers() {
    std::env::set_var("EXPBOOK_PACK_WINDOW", "not-a-number");
    let config = apply_env_overrides(CentralConfig::default());
    std::env::remove_var("EXPBOOK_PACK_WINDOW");

    assert_eq!(config.pack.window, 400);
}
