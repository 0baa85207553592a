//! Manifest rendering unit tests

use std::collections::BTreeMap;

use dpagent::kube::manifests::{
    app_deployment, app_ingress, app_service, database_pvc, database_secret, database_service,
    database_statefulset, escape, ingress_route_tcp, namespace, DatabaseStatefulSetInput,
};
use dpagent::models::payloads::DatabaseKind;

fn postgres_input<'a>() -> DatabaseStatefulSetInput<'a> {
    DatabaseStatefulSetInput {
        namespace: "user-1",
        name: "ordersdb",
        kind: DatabaseKind::Postgres,
        version: "15",
        username: "orders",
        memory_limit: "512Mi",
    }
}

#[test]
fn postgres_statefulset_matches_the_parameter_table() {
    let yaml = database_statefulset(&postgres_input());

    assert!(yaml.contains(r#"image: "postgres:15""#));
    assert!(yaml.contains("containerPort: 5432"));
    assert!(yaml.contains("mountPath: /var/lib/postgresql/data"));
    assert!(yaml.contains("subPath: postgres"));
    assert!(yaml.contains(r#"command: ["pg_isready", "-U", "orders"]"#));
    assert!(yaml.contains("initialDelaySeconds: 5"));
    assert!(yaml.contains("periodSeconds: 5"));
    assert!(yaml.contains("timeoutSeconds: 5"));
    // Liveness timing is shared by every engine
    assert!(yaml.contains("initialDelaySeconds: 30"));
    assert!(yaml.contains("periodSeconds: 10"));
    assert!(yaml.contains(r#"memory: "512Mi""#));
}

#[test]
fn mongodb_statefulset_parameters() {
    let yaml = database_statefulset(&DatabaseStatefulSetInput {
        kind: DatabaseKind::Mongodb,
        version: "7",
        ..postgres_input()
    });

    assert!(yaml.contains(r#"image: "mongo:7""#));
    assert!(yaml.contains("containerPort: 27017"));
    assert!(yaml.contains("mountPath: /data/db"));
    assert!(!yaml.contains("subPath"));
    assert!(yaml.contains(r#"command: ["mongosh", "--eval", "db.adminCommand('ping')"]"#));
    assert!(yaml.contains("timeoutSeconds: 10"));
}

#[test]
fn redis_statefulset_enables_appendonly_and_requirepass() {
    let yaml = database_statefulset(&DatabaseStatefulSetInput {
        kind: DatabaseKind::Redis,
        version: "7",
        ..postgres_input()
    });

    assert!(yaml.contains(r#"image: "redis:7""#));
    assert!(yaml.contains("containerPort: 6379"));
    assert!(yaml.contains("mountPath: /data"));
    assert!(yaml.contains(
        r#"command: ["redis-server", "--appendonly", "yes", "--requirepass", "$(REDIS_PASSWORD)"]"#
    ));
    assert!(yaml.contains(r#"command: ["redis-cli", "ping"]"#));
}

#[test]
fn postgres_secret_carries_the_standard_keys() {
    let yaml = database_secret(
        "user-1",
        "ordersdb",
        DatabaseKind::Postgres,
        "orders",
        "s3cret",
        "orders",
    );

    assert!(yaml.contains("type: Opaque"));
    assert!(yaml.contains("stringData:"));
    assert!(yaml.contains(r#"POSTGRES_USER: "orders""#));
    assert!(yaml.contains(r#"POSTGRES_PASSWORD: "s3cret""#));
    assert!(yaml.contains(r#"POSTGRES_DB: "orders""#));
}

#[test]
fn pvc_requests_the_declared_size() {
    let yaml = database_pvc("user-1", "ordersdb", "10Gi");
    assert!(yaml.contains(r#"storage: "10Gi""#));
    assert!(yaml.contains("ReadWriteOnce"));
}

#[test]
fn database_service_is_headless() {
    let yaml = database_service("user-1", "ordersdb", DatabaseKind::Postgres);
    assert!(yaml.contains("clusterIP: None"));
    assert!(yaml.contains("port: 5432"));
}

#[test]
fn ingress_route_tcp_matches_sni() {
    let yaml = ingress_route_tcp("user-1", "ordersdb", "db.example.com", DatabaseKind::Postgres);
    assert!(yaml.contains("kind: IngressRouteTCP"));
    assert!(yaml.contains("HostSNI(`db.example.com`)"));
    assert!(yaml.contains("port: 5432"));
    assert!(yaml.contains("passthrough: true"));
}

#[test]
fn app_service_fronts_the_container_port() {
    let yaml = app_service("user-1", "hello", 5006);
    assert!(yaml.contains("port: 80"));
    assert!(yaml.contains("targetPort: 5006"));
    assert!(yaml.contains(r#"app: "hello""#));
}

#[test]
fn app_ingress_has_cert_manager_annotations() {
    let yaml = app_ingress("user-1", "hello", "hello-domain-example-com", "example.com");
    assert!(yaml.contains("cert-manager.io/cluster-issuer"));
    assert!(yaml.contains(r#"host: "example.com""#));
    assert!(yaml.contains(r#"name: "hello""#));
}

#[test]
fn quotes_in_values_are_escaped() {
    assert_eq!(escape(r#"say "hi""#), r#"say \"hi\""#);

    let yaml = database_secret(
        "user-1",
        "ordersdb",
        DatabaseKind::Postgres,
        "orders",
        r#"pa"ss"#,
        "orders",
    );
    assert!(yaml.contains(r#"POSTGRES_PASSWORD: "pa\"ss""#));
}

#[test]
fn env_vars_render_in_sorted_order() {
    let mut env = BTreeMap::new();
    env.insert("ZED".to_string(), "1".to_string());
    env.insert("ALPHA".to_string(), "2".to_string());

    let yaml = app_deployment("user-1", "hello", "docker.io/library/hello:d1", 3000, &env);
    let alpha = yaml.find("ALPHA").unwrap();
    let zed = yaml.find("ZED").unwrap();
    assert!(alpha < zed);
}

#[test]
fn rendering_is_deterministic() {
    assert_eq!(namespace("user-1"), namespace("user-1"));
    assert_eq!(
        database_statefulset(&postgres_input()),
        database_statefulset(&postgres_input())
    );
}
