use std::io::Write;
use std::path::Path;

use agentflow_core::config::AppConfig;
use agentflow_core::error::FlowError;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[engine]
max_node_visits = 500
max_visits_per_node = 7
collaborator_timeout_secs = 0

[log]
filter = "agentflow=debug"

[workflows]
dir = "/srv/flows"
extension = "af"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.engine.max_node_visits, 500);
    assert_eq!(config.engine.max_visits_per_node, 7);
    assert_eq!(config.engine.collaborator_timeout_secs, 0);
    assert_eq!(config.log.filter, "agentflow=debug");
    assert_eq!(config.workflows.extension, "af");
    assert_eq!(
        config.workflows_dir(Path::new("/ignored")),
        Path::new("/srv/flows")
    );
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("AGENTFLOW_TEST_FLOW_DIR", "expanded-dir");

    let toml_content = r#"
[workflows]
dir = "${AGENTFLOW_TEST_FLOW_DIR}"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.workflows.dir, "expanded-dir");
    assert_eq!(
        config.workflows_dir(Path::new("/etc/agentflow")),
        Path::new("/etc/agentflow/expanded-dir")
    );

    std::env::remove_var("AGENTFLOW_TEST_FLOW_DIR");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let toml_content = r#"
[engine]
max_visits_per_node = 3
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.engine.max_visits_per_node, 3);
    assert_eq!(config.engine.max_node_visits, 10_000);
    assert_eq!(config.engine.collaborator_timeout_secs, 120);
    assert_eq!(config.log.filter, "agentflow=info,warn");
    assert_eq!(config.workflows.dir, "workflows");
    assert_eq!(config.workflows.extension, "flow");
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("absent.toml");

    assert!(matches!(
        AppConfig::load(&path),
        Err(FlowError::ConfigNotFound(_))
    ));

    let config = AppConfig::load_or_default(&path).expect("defaults");
    assert_eq!(config.engine.max_node_visits, 10_000);
}

#[test]
fn test_invalid_toml_is_config_error() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[engine\nmax_node_visits = ").expect("write toml");

    assert!(matches!(
        AppConfig::load(tmp.path()),
        Err(FlowError::Config(_))
    ));
}

#[test]
fn test_effective_config_round_trips() {
    let config = AppConfig::default();
    let text = config.to_toml_string().expect("serialize");
    let reloaded = AppConfig::from_toml_str(&text).expect("parse");
    assert_eq!(reloaded.engine.max_node_visits, config.engine.max_node_visits);
    assert_eq!(reloaded.workflows.dir, config.workflows.dir);
}
