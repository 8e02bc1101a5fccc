//! Registry behaviour against the on-disk JSON store

use std::fs;
use std::sync::Arc;

use envstore::{AuthType, Environment, EnvironmentPatch, EnvironmentRegistry, JsonFileStore, RegistryError};
use tempfile::TempDir;

fn open(temp: &TempDir) -> EnvironmentRegistry {
    let store = Arc::new(JsonFileStore::new(temp.path().join("environments.json")));
    EnvironmentRegistry::open(store)
}

#[test]
fn test_mutations_survive_reopen() {
    let temp = TempDir::new().expect("Failed to create temp dir");

    {
        let mut registry = open(&temp);
        registry
            .add(
                Environment::new("emea", "EMEA", "eu-frankfurt-1")
                    .with_compartment("ocid1.compartment.oc1..emea")
                    .with_auth(AuthType::ConfigFile, "EMEA"),
            )
            .expect("add emea");
        registry
            .add(Environment::new("apac", "APAC", "ap-tokyo-1").with_active(false))
            .expect("add apac");
        registry.set_default("emea").expect("set default");
        registry.remove("default").expect("remove bootstrap");
    }

    let registry = open(&temp);
    let ids: Vec<&str> = registry.list().iter().map(|env| env.id.as_str()).collect();
    assert_eq!(ids, vec!["emea", "apac"]);
    assert_eq!(registry.get_default().unwrap().id, "emea");
    assert_eq!(registry.get("emea").unwrap().config_profile, "EMEA");
    assert_eq!(registry.list_active().len(), 1);
}

#[test]
fn test_corrupt_file_falls_back_to_bootstrap() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    fs::write(temp.path().join("environments.json"), "[{broken").unwrap();

    let registry = open(&temp);
    assert_eq!(registry.len(), 1);
    assert!(registry.get_default().is_some());
}

#[test]
fn test_unreadable_file_is_kept_when_registry_changes() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let path = temp.path().join("environments.json");
    let typo = r#"[
        {"id": "us", "name": "US", "region": "us-ashburn-1"},
        {"id": "eu", "name": "EU", "region": "eu-frankfurt-1"},
        {"id": "ap", "name": "AP", "region": "ap-tokyo-1"},
    ]"#;
    fs::write(&path, typo).unwrap();

    let mut registry = open(&temp);
    assert!(registry.load_error().is_some());
    assert_eq!(registry.len(), 1);

    registry
        .add(Environment::new("sa", "SA", "sa-saopaulo-1"))
        .expect("add after fallback");

    // The typo'd original survives next to the new file
    let backup = temp.path().join("environments.json.bak");
    assert_eq!(fs::read_to_string(&backup).unwrap(), typo);

    let reopened = open(&temp);
    assert!(reopened.load_error().is_none());
    let ids: Vec<&str> = reopened.list().iter().map(|env| env.id.as_str()).collect();
    assert_eq!(ids, vec!["default", "sa"]);
}

#[test]
fn test_readable_file_reports_no_load_error() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let mut registry = open(&temp);
    assert!(registry.load_error().is_none());

    registry.add(Environment::new("us", "US", "us-ashburn-1")).unwrap();
    registry.add(Environment::new("eu", "EU", "eu-frankfurt-1")).unwrap();
    assert!(!temp.path().join("environments.json.bak").exists());
}

#[test]
fn test_loads_legacy_environment_file() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let legacy = r#"[
        {"id": "prod", "name": "Prod", "region": "us-phoenix-1", "compartmentId": "ocid1..p",
         "namespace": "prodns", "authType": "resource_principal"},
        {"id": "dev", "name": "Dev", "region": "us-ashburn-1", "compartmentId": "ocid1..d",
         "namespace": "devns", "configProfile": "DEV"}
    ]"#;
    fs::write(temp.path().join("environments.json"), legacy).unwrap();

    let registry = open(&temp);
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.get_default().unwrap().id, "prod");
    assert_eq!(registry.get("prod").unwrap().auth_type, AuthType::ResourcePrincipal);
    assert_eq!(registry.get("dev").unwrap().config_profile, "DEV");
}

#[test]
fn test_update_cannot_change_id() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let mut registry = open(&temp);

    let patch: EnvironmentPatch = serde_json::from_str(r#"{"id": "renamed", "region": "eu-paris-1"}"#).unwrap();
    registry.update("default", &patch).unwrap();

    let reopened = open(&temp);
    assert!(reopened.get("renamed").is_none());
    assert_eq!(reopened.get("default").unwrap().region, "eu-paris-1");
}

#[test]
fn test_last_environment_is_protected_on_disk() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let mut registry = open(&temp);

    let err = registry.remove("default").unwrap_err();
    assert!(matches!(err, RegistryError::LastEnvironment(_)));
    assert!(!temp.path().join("environments.json").exists());
}
