use super::*;
use std::collections::HashMap;
use std::time::Duration;
use tempfile::TempDir;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

const MINIMAL: &str = r#"
organization = "contoso"
pat = "file-pat"
management_project = "Management"
"#;

#[test]
fn test_defaults_applied_to_minimal_file() {
    let config = WorkerConfig::from_sources(Some(MINIMAL), env_from(&[])).expect("config");

    assert_eq!(config.organization, "contoso");
    assert_eq!(config.pat.expose_secret(), "file-pat");
    assert_eq!(config.api_version, "7.1");
    assert_eq!(config.process_template_id, DEFAULT_PROCESS_TEMPLATE_ID);
    assert_eq!(config.base_url.as_str(), "https://dev.azure.com/");
    assert_eq!(config.identity_url.as_str(), "https://vssps.dev.azure.com/");
    assert_eq!(config.release_url.as_str(), "https://vsrm.dev.azure.com/");
    assert_eq!(config.polling, PollingConfig::default());
    assert_eq!(config.worker.concurrency, 4);
    assert_eq!(config.worker.log_format, LogFormat::Pretty);
}

#[test]
fn test_environment_overrides_file() {
    let env = env_from(&[
        (ENV_ORGANIZATION, "fabrikam"),
        (ENV_PAT, "env-pat"),
        (ENV_MANAGEMENT_PROJECT, "Tickets"),
    ]);

    let config = WorkerConfig::from_sources(Some(MINIMAL), env).expect("config");

    assert_eq!(config.organization, "fabrikam");
    assert_eq!(config.pat.expose_secret(), "env-pat");
    assert_eq!(config.management_project, "Tickets");
}

#[test]
fn test_environment_only() {
    let env = env_from(&[
        (ENV_ORGANIZATION, "contoso"),
        (ENV_PAT, "env-pat"),
        (ENV_MANAGEMENT_PROJECT, "Management"),
    ]);

    let config = WorkerConfig::from_sources(None, env).expect("config");

    assert_eq!(config.organization, "contoso");
}

#[test]
fn test_blank_environment_value_does_not_override() {
    let env = env_from(&[(ENV_ORGANIZATION, "  ")]);

    let config = WorkerConfig::from_sources(Some(MINIMAL), env).expect("config");

    assert_eq!(config.organization, "contoso");
}

#[test]
fn test_missing_pat_is_config_error() {
    let content = r#"
organization = "contoso"
management_project = "Management"
"#;

    let result = WorkerConfig::from_sources(Some(content), env_from(&[]));

    match result {
        Err(Error::Config(msg)) => assert!(msg.contains("AZP_PAT")),
        other => panic!("Expected Config error, got {:?}", other),
    }
}

#[test]
fn test_missing_organization_is_config_error() {
    let env = env_from(&[(ENV_PAT, "env-pat"), (ENV_MANAGEMENT_PROJECT, "Management")]);

    let result = WorkerConfig::from_sources(None, env);

    match result {
        Err(Error::Config(msg)) => assert!(msg.contains("organization")),
        other => panic!("Expected Config error, got {:?}", other),
    }
}

#[test]
fn test_debug_output_hides_pat() {
    let config = WorkerConfig::from_sources(Some(MINIMAL), env_from(&[])).expect("config");

    let debug_output = format!("{:?}", config);

    assert!(!debug_output.contains("file-pat"));
}

#[test]
fn test_sections_parsed() {
    let content = format!(
        "{}\n{}",
        MINIMAL,
        r#"
api_version = "7.2-preview"
base_url = "http://localhost:8080"

[polling]
interval_secs = 2
max_wait_secs = 0

[worker]
concurrency = 8
dead_letter_path = "/var/lib/azp/dead-letter"
checkpoint_dir = "/var/lib/azp/checkpoints"
log_format = "json"
"#
    );

    let config = WorkerConfig::from_sources(Some(&content), env_from(&[])).expect("config");

    assert_eq!(config.api_version, "7.2-preview");
    assert_eq!(config.base_url.as_str(), "http://localhost:8080/");
    assert_eq!(config.worker.concurrency, 8);
    assert_eq!(
        config.worker.dead_letter_path,
        PathBuf::from("/var/lib/azp/dead-letter")
    );
    assert_eq!(config.worker.log_format, LogFormat::Json);

    let settings = config.provisioner_settings();
    assert_eq!(settings.poll.interval, Duration::from_secs(2));
    assert_eq!(settings.poll.max_wait, None);
}

#[test]
fn test_client_settings_carry_connection_values() {
    let config = WorkerConfig::from_sources(Some(MINIMAL), env_from(&[])).expect("config");

    let settings = config.client_settings();

    assert_eq!(settings.organization, "contoso");
    assert_eq!(settings.management_project, "Management");
    assert_eq!(settings.api_version, "7.1");
    assert_eq!(settings.pat.expose_secret(), "file-pat");
}

#[test]
fn test_invalid_url_rejected() {
    let content = format!("{}\nbase_url = \"not a url\"\n", MINIMAL);

    let result = WorkerConfig::from_sources(Some(&content), env_from(&[]));

    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_zero_concurrency_rejected() {
    let content = format!("{}\n[worker]\nconcurrency = 0\n", MINIMAL);

    let result = WorkerConfig::from_sources(Some(&content), env_from(&[]));

    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_invalid_toml_rejected() {
    let result = WorkerConfig::from_sources(Some("invalid = toml = syntax"), env_from(&[]));

    assert!(matches!(result, Err(Error::ParseTomlFile(_))));
}

#[test]
fn test_load_nonexistent_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("missing.toml");

    let result = WorkerConfig::load(Some(&path));

    match result {
        Err(Error::Config(msg)) => assert!(msg.contains("Configuration file not found")),
        other => panic!("Expected Config error, got {:?}", other),
    }
}

#[test]
fn test_load_from_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("azp-provisioner.toml");
    let content = r#"
organization = "contoso"
pat = "file-pat"
management_project = "Management"
process_template_id = "adcc42ab-9882-485e-a3ed-7678f01f66bc"
"#;
    fs::write(&path, content).expect("Failed to write config");

    let config = WorkerConfig::load(Some(&path));

    // The process environment may override the connection values, but not the
    // template id.
    let config = config.expect("config");
    assert_eq!(
        config.process_template_id,
        "adcc42ab-9882-485e-a3ed-7678f01f66bc"
    );
}
