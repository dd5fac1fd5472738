use azdisc::errors::DiscoveryError;
use azdisc::utils::config::load_config_at;
use std::fs;
use std::path::{Path, PathBuf};

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    fs::write(path, content).unwrap();
}

#[test]
fn parses_json_config_with_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg_path = tmp.path().join("config.json");
    write(
        &cfg_path,
        r#"{
  "app": "payments",
  "subscriptions": ["sub-1", "sub-2"],
  "seedResourceGroups": ["rg-app", "rg-data"],
  "outputDir": "out"
}"#,
    );

    let cfg = load_config_at(&cfg_path).expect("config parsed");
    assert_eq!(cfg.app, "payments");
    assert_eq!(cfg.subscriptions, vec!["sub-1", "sub-2"]);
    assert_eq!(cfg.seed_scope().resource_groups, vec!["rg-app", "rg-data"]);
    assert_eq!(cfg.output_dir, PathBuf::from("out"));
    assert!(!cfg.include_rbac);
    assert_eq!(cfg.max_iterations, 50);
    assert_eq!(cfg.batch_size, 200);
    assert_eq!(cfg.plantuml_jar, None);
    assert_eq!(cfg.artifact("graph.json"), PathBuf::from("out/graph.json"));
}

#[test]
fn parses_toml_config() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg_path = tmp.path().join("azdisc.toml");
    write(
        &cfg_path,
        r#"
app = "payments"
subscriptions = []
seedResourceGroups = ["rg-app"]
outputDir = "/tmp/azdisc-out"
includeRbac = true
maxIterations = 5
batchSize = 25
plantumlJar = "/opt/plantuml.jar"
"#,
    );

    let cfg = load_config_at(&cfg_path).expect("config parsed");
    assert!(cfg.include_rbac);
    assert_eq!(cfg.expand_options().max_iterations, 5);
    assert_eq!(cfg.expand_options().batch_size, 25);
    assert_eq!(cfg.plantuml_jar.as_deref(), Some("/opt/plantuml.jar"));
}

#[test]
fn missing_required_field_is_a_config_error() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg_path = tmp.path().join("config.json");
    write(&cfg_path, r#"{"app": "x", "subscriptions": [], "outputDir": "out"}"#);

    let err = load_config_at(&cfg_path).unwrap_err();
    assert!(matches!(err, DiscoveryError::Config { .. }));
    assert!(err.to_string().contains("seedResourceGroups"));
}

#[test]
fn zero_limits_are_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg_path = tmp.path().join("config.json");
    write(
        &cfg_path,
        r#"{"app": "x", "subscriptions": [], "seedResourceGroups": [], "outputDir": "out", "batchSize": 0}"#,
    );
    let err = load_config_at(&cfg_path).unwrap_err();
    assert!(err.to_string().contains("batchSize"));
}

#[test]
fn unreadable_file_is_a_config_error() {
    let tmp = tempfile::tempdir().unwrap();
    let err = load_config_at(&tmp.path().join("nope.json")).unwrap_err();
    assert!(matches!(err, DiscoveryError::Config { .. }));
}
