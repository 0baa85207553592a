//! Wire model unit tests

use dpagent::models::agent::{AgentStatus, HeartbeatSnapshot, ResourceSnapshot};
use dpagent::models::build::Framework;
use dpagent::models::command::{Command, CommandKind, CommandResult, CommandStatus};
use dpagent::models::payloads::{DatabasePayload, DeployPayload};

#[test]
fn every_wire_kind_parses() {
    let kinds = [
        "DEPLOY",
        "STOP",
        "RESTART",
        "DELETE",
        "CREATE_NAMESPACE",
        "UPDATE_ENV",
        "ADD_CUSTOM_DOMAIN",
        "REMOVE_CUSTOM_DOMAIN",
        "CREATE_DATABASE",
        "DELETE_DATABASE",
        "UPDATE_DATABASE_PASSWORD",
        "ENABLE_DATABASE_EXTERNAL_ACCESS",
        "DISABLE_DATABASE_EXTERNAL_ACCESS",
        "CREATE_BACKUP",
        "RESTORE_BACKUP",
    ];

    for kind in kinds {
        let parsed = CommandKind::parse(kind).unwrap_or_else(|| panic!("{kind} did not parse"));
        assert_eq!(parsed.as_str(), kind);
    }
}

#[test]
fn unknown_kinds_are_rejected() {
    assert!(CommandKind::parse("SCALE").is_none());
    assert!(CommandKind::parse("deploy").is_none());
    assert!(CommandKind::parse("").is_none());
}

#[test]
fn commands_deserialize_from_camel_case() {
    let raw = r#"{
        "id": "cmd-1",
        "kind": "DEPLOY",
        "payload": {"appName": "hello"},
        "status": "pending",
        "createdAt": "2025-11-02T10:00:00Z"
    }"#;

    let command: Command = serde_json::from_str(raw).unwrap();
    assert_eq!(command.id, "cmd-1");
    assert_eq!(command.status, CommandStatus::Pending);
    assert_eq!(command.payload["appName"], "hello");
}

#[test]
fn failed_results_always_carry_an_error() {
    let result = CommandResult::fail("boom");
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("boom"));

    let raw = serde_json::to_value(&CommandResult::ok()).unwrap();
    assert!(raw.get("error").is_none());
    assert!(raw.get("logs").is_none());
}

#[test]
fn deploy_payload_defaults() {
    let raw = r#"{
        "appName": "hello",
        "deploymentId": "d1",
        "namespace": "user-1",
        "gitRepoUrl": "https://github.com/acme/hello.git",
        "framework": "nextjs"
    }"#;

    let payload: DeployPayload = serde_json::from_str(raw).unwrap();
    assert_eq!(payload.git_branch, "main");
    assert_eq!(payload.port, 3000);
    assert!(payload.env_vars.is_empty());
    assert_eq!(payload.framework, Framework::Nextjs);

    let spec = payload.build_spec();
    assert_eq!(spec.app_name, "hello");
    assert_eq!(spec.deployment_id, "d1");
}

#[test]
fn framework_wire_names_are_kebab_case() {
    assert_eq!(
        serde_json::from_str::<Framework>(r#""react-vite""#).unwrap(),
        Framework::ReactVite
    );
    assert_eq!(
        serde_json::from_str::<Framework>(r#""svelte-vite""#).unwrap(),
        Framework::SvelteVite
    );
    assert_eq!(
        serde_json::from_str::<Framework>(r#""nodejs""#).unwrap(),
        Framework::Nodejs
    );
    assert!(serde_json::from_str::<Framework>(r#""rails""#).is_err());
}

#[test]
fn database_payload_scenario_fields() {
    let raw = r#"{
        "name": "ordersdb",
        "namespace": "user-1",
        "type": "postgres",
        "version": "15",
        "password": "s3cret",
        "storageSize": "10Gi",
        "memoryLimit": "512Mi"
    }"#;

    let payload: DatabasePayload = serde_json::from_str(raw).unwrap();
    assert_eq!(payload.storage_size, "10Gi");
    assert_eq!(payload.memory_limit, "512Mi");
    assert_eq!(payload.version.as_deref(), Some("15"));
}

#[test]
fn heartbeats_serialize_camel_case() {
    let snapshot = HeartbeatSnapshot {
        status: AgentStatus::Busy,
        resources: ResourceSnapshot::default(),
        running_pods: vec!["hello-abc".to_string()],
        error_message: None,
    };

    let raw = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(raw["status"], "busy");
    assert!(raw.get("runningPods").is_some());
    assert!(raw.get("errorMessage").is_none());
    assert!(raw["resources"].get("cpuCores").is_some());
}
