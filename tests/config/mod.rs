use bj_cli::config::{
    self, CONFIG_FILE, Config, DEFAULT_AUTO_PRUNE_HOURS, DEFAULT_LOG_DIR, DEFAULT_VIEWER, load,
    validate,
};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn load_writes_default_file_when_missing() {
    let dir = tempdir().expect("tempdir");
    let config_dir = dir.path().join("bj");

    let cfg = load(&config_dir).expect("load");

    assert_eq!(cfg, Config::default());
    assert_eq!(cfg.log_dir, DEFAULT_LOG_DIR);
    assert_eq!(cfg.viewer, DEFAULT_VIEWER);
    assert_eq!(cfg.auto_prune_hours, DEFAULT_AUTO_PRUNE_HOURS);

    let reloaded = config::parse(&config_dir.join(CONFIG_FILE)).expect("parse default file");
    assert_eq!(reloaded, cfg);
}

#[test]
fn load_reads_partial_file_and_fills_defaults() {
    let dir = tempdir().expect("tempdir");
    fs::write(
        dir.path().join(CONFIG_FILE),
        "viewer = \"cat\"\nlog_dir = \"\"\n",
    )
    .expect("write config");

    let cfg = load(dir.path()).expect("load");
    assert_eq!(cfg.viewer, "cat");
    assert_eq!(cfg.log_dir, DEFAULT_LOG_DIR);
    assert_eq!(cfg.auto_prune_hours, DEFAULT_AUTO_PRUNE_HOURS);
}

#[test]
fn load_rejects_unknown_keys() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join(CONFIG_FILE), "pager = \"less\"\n").expect("write config");

    let err = load(dir.path()).expect_err("unknown key");
    assert!(err.contains("parse config toml"));
}

#[test]
fn log_dir_resolves_against_config_dir() {
    let relative = Config::default();
    assert_eq!(
        relative.log_dir_path(Path::new("/home/u/.config/bj")),
        Path::new("/home/u/.config/bj/logs")
    );

    let absolute = Config {
        log_dir: "/var/log/bj".to_string(),
        ..Config::default()
    };
    assert_eq!(
        absolute.log_dir_path(Path::new("/home/u/.config/bj")),
        Path::new("/var/log/bj")
    );
}

#[test]
fn auto_prune_zero_disables() {
    let off = Config {
        auto_prune_hours: 0,
        ..Config::default()
    };
    assert_eq!(off.auto_prune_age(), None);
    assert_eq!(
        Config::default().auto_prune_age(),
        Some(Duration::from_secs(24 * 3600))
    );
}

#[test]
fn validate_reports_blank_and_oversized_fields() {
    let cfg = Config {
        log_dir: "   ".to_string(),
        viewer: String::new(),
        auto_prune_hours: u64::MAX,
    };

    let errs = validate(&cfg).expect_err("invalid config");
    let fields: Vec<&str> = errs.issues.iter().map(|i| i.field.as_str()).collect();
    assert_eq!(fields, vec!["log_dir", "viewer", "auto_prune_hours"]);
    assert!(errs.to_string().contains("log_dir"));

    assert!(validate(&Config::default()).is_ok());
}

#[test]
fn load_rejects_oversized_prune_window() {
    let dir = tempdir().expect("tempdir");
    fs::write(
        dir.path().join(CONFIG_FILE),
        "auto_prune_hours = 99999999\n",
    )
    .expect("write config");

    let err = load(dir.path()).expect_err("too large");
    assert!(err.contains("auto_prune_hours"));
}
