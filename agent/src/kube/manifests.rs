//! Deterministic Kubernetes manifest rendering
//!
//! Pure text renderers from typed inputs. No I/O, no async: given the same
//! inputs the output bytes are identical, which is what the tests pin.

use std::collections::BTreeMap;

use crate::models::payloads::DatabaseKind;

/// Label carried by every database StatefulSet; the resource collector
/// scrapes it to enumerate managed databases.
pub const DATABASE_LABEL: &str = "deploypilot.io/database";

/// Escape a value for interpolation inside double-quoted YAML scalars
pub fn escape(value: &str) -> String {
    value.replace('"', "\\\"")
}

/// Per-engine parameters for the database StatefulSet
#[derive(Debug, Clone)]
pub struct DatabaseParams {
    pub port: u16,
    pub image: String,
    pub mount_path: &'static str,
    pub sub_path: Option<&'static str>,
    /// Rendered YAML array for the readiness exec probe
    pub readiness_exec: String,
    pub readiness_initial_secs: u32,
    pub readiness_period_secs: u32,
    pub probe_timeout_secs: u32,
}

impl DatabaseKind {
    pub fn params(&self, version: &str, username: &str) -> DatabaseParams {
        match self {
            DatabaseKind::Postgres => DatabaseParams {
                port: 5432,
                image: format!("postgres:{}", escape(version)),
                mount_path: "/var/lib/postgresql/data",
                sub_path: Some("postgres"),
                readiness_exec: format!(r#"["pg_isready", "-U", "{}"]"#, escape(username)),
                readiness_initial_secs: 5,
                readiness_period_secs: 5,
                probe_timeout_secs: 5,
            },
            DatabaseKind::Mongodb => DatabaseParams {
                port: 27017,
                image: format!("mongo:{}", escape(version)),
                mount_path: "/data/db",
                sub_path: None,
                readiness_exec: r#"["mongosh", "--eval", "db.adminCommand('ping')"]"#.to_string(),
                readiness_initial_secs: 10,
                readiness_period_secs: 10,
                probe_timeout_secs: 10,
            },
            DatabaseKind::Redis => DatabaseParams {
                port: 6379,
                image: format!("redis:{}", escape(version)),
                mount_path: "/data",
                sub_path: None,
                readiness_exec: r#"["redis-cli", "ping"]"#.to_string(),
                readiness_initial_secs: 5,
                readiness_period_secs: 5,
                probe_timeout_secs: 10,
            },
        }
    }
}

/// Render a Namespace
pub fn namespace(name: &str) -> String {
    format!(
        r#"apiVersion: v1
kind: Namespace
metadata:
  name: "{name}"
  labels:
    deploypilot.io/managed: "true"
"#,
        name = escape(name),
    )
}

/// Render an application Deployment
pub fn app_deployment(
    namespace: &str,
    app: &str,
    image: &str,
    port: u16,
    env_vars: &BTreeMap<String, String>,
) -> String {
    let mut env_block = String::new();
    if !env_vars.is_empty() {
        env_block.push_str("        env:\n");
        for (key, value) in env_vars {
            env_block.push_str(&format!(
                "        - name: \"{}\"\n          value: \"{}\"\n",
                escape(key),
                escape(value),
            ));
        }
    }

    format!(
        r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: "{app}"
  namespace: "{namespace}"
  labels:
    app: "{app}"
spec:
  replicas: 1
  selector:
    matchLabels:
      app: "{app}"
  template:
    metadata:
      labels:
        app: "{app}"
    spec:
      containers:
      - name: "{app}"
        image: "{image}"
        imagePullPolicy: IfNotPresent
        ports:
        - containerPort: {port}
{env_block}"#,
        app = escape(app),
        namespace = escape(namespace),
        image = escape(image),
        port = port,
        env_block = env_block,
    )
}

/// Render an application Service
pub fn app_service(namespace: &str, app: &str, port: u16) -> String {
    format!(
        r#"apiVersion: v1
kind: Service
metadata:
  name: "{app}"
  namespace: "{namespace}"
spec:
  selector:
    app: "{app}"
  ports:
  - port: 80
    targetPort: {port}
"#,
        app = escape(app),
        namespace = escape(namespace),
        port = port,
    )
}

/// Render an HTTPS Ingress for an app domain, with cert-manager annotations
pub fn app_ingress(namespace: &str, app: &str, ingress_name: &str, domain: &str) -> String {
    format!(
        r#"apiVersion: networking.k8s.io/v1
kind: Ingress
metadata:
  name: "{ingress_name}"
  namespace: "{namespace}"
  annotations:
    cert-manager.io/cluster-issuer: "letsencrypt-prod"
    traefik.ingress.kubernetes.io/router.entrypoints: "websecure"
    traefik.ingress.kubernetes.io/router.tls: "true"
spec:
  tls:
  - hosts:
    - "{domain}"
    secretName: "{ingress_name}-tls"
  rules:
  - host: "{domain}"
    http:
      paths:
      - path: /
        pathType: Prefix
        backend:
          service:
            name: "{app}"
            port:
              number: 80
"#,
        ingress_name = escape(ingress_name),
        namespace = escape(namespace),
        app = escape(app),
        domain = escape(domain),
    )
}

/// Render the opaque Secret holding database credentials
pub fn database_secret(
    namespace: &str,
    name: &str,
    kind: DatabaseKind,
    username: &str,
    password: &str,
    database: &str,
) -> String {
    let string_data = match kind {
        DatabaseKind::Postgres => format!(
            "  POSTGRES_USER: \"{}\"\n  POSTGRES_PASSWORD: \"{}\"\n  POSTGRES_DB: \"{}\"\n",
            escape(username),
            escape(password),
            escape(database),
        ),
        DatabaseKind::Mongodb => format!(
            "  MONGO_INITDB_ROOT_USERNAME: \"{}\"\n  MONGO_INITDB_ROOT_PASSWORD: \"{}\"\n",
            escape(username),
            escape(password),
        ),
        DatabaseKind::Redis => {
            format!("  REDIS_PASSWORD: \"{}\"\n", escape(password))
        }
    };

    format!(
        r#"apiVersion: v1
kind: Secret
metadata:
  name: "{name}-credentials"
  namespace: "{namespace}"
type: Opaque
stringData:
{string_data}"#,
        name = escape(name),
        namespace = escape(namespace),
        string_data = string_data,
    )
}

/// Render the PersistentVolumeClaim backing a database
pub fn database_pvc(namespace: &str, name: &str, storage_size: &str) -> String {
    format!(
        r#"apiVersion: v1
kind: PersistentVolumeClaim
metadata:
  name: "{name}-data"
  namespace: "{namespace}"
spec:
  accessModes:
  - ReadWriteOnce
  resources:
    requests:
      storage: "{storage_size}"
"#,
        name = escape(name),
        namespace = escape(namespace),
        storage_size = escape(storage_size),
    )
}

/// Render a headless Service for a database StatefulSet
pub fn database_service(namespace: &str, name: &str, kind: DatabaseKind) -> String {
    let params = kind.params(kind.default_version(), kind.default_username());
    format!(
        r#"apiVersion: v1
kind: Service
metadata:
  name: "{name}"
  namespace: "{namespace}"
spec:
  clusterIP: None
  selector:
    app: "{name}"
  ports:
  - port: {port}
    targetPort: {port}
"#,
        name = escape(name),
        namespace = escape(namespace),
        port = params.port,
    )
}

/// Typed input for the database StatefulSet renderer
#[derive(Debug, Clone)]
pub struct DatabaseStatefulSetInput<'a> {
    pub namespace: &'a str,
    pub name: &'a str,
    pub kind: DatabaseKind,
    pub version: &'a str,
    pub username: &'a str,
    pub memory_limit: &'a str,
}

/// Render a database StatefulSet
pub fn database_statefulset(input: &DatabaseStatefulSetInput<'_>) -> String {
    let params = input.kind.params(input.version, input.username);

    let sub_path = match params.sub_path {
        Some(sub_path) => format!("          subPath: {}\n", sub_path),
        None => String::new(),
    };

    // Redis takes credentials on the command line; the others read env vars
    // straight from the secret.
    let container_extra = match input.kind {
        DatabaseKind::Redis => format!(
            "        command: [\"redis-server\", \"--appendonly\", \"yes\", \"--requirepass\", \"$(REDIS_PASSWORD)\"]\n\
             {env}",
            env = env_from_secret(input.name),
        ),
        _ => env_from_secret(input.name),
    };

    format!(
        r#"apiVersion: apps/v1
kind: StatefulSet
metadata:
  name: "{name}"
  namespace: "{namespace}"
  labels:
    app: "{name}"
    {database_label}: "{kind}"
spec:
  serviceName: "{name}"
  replicas: 1
  selector:
    matchLabels:
      app: "{name}"
  template:
    metadata:
      labels:
        app: "{name}"
    spec:
      containers:
      - name: "{kind}"
        image: "{image}"
        ports:
        - containerPort: {port}
{container_extra}        resources:
          limits:
            memory: "{memory_limit}"
        volumeMounts:
        - name: data
          mountPath: {mount_path}
{sub_path}        readinessProbe:
          exec:
            command: {readiness_exec}
          initialDelaySeconds: {readiness_initial}
          periodSeconds: {readiness_period}
          timeoutSeconds: {probe_timeout}
        livenessProbe:
          exec:
            command: {readiness_exec}
          initialDelaySeconds: 30
          periodSeconds: 10
          timeoutSeconds: {probe_timeout}
      volumes:
      - name: data
        persistentVolumeClaim:
          claimName: "{name}-data"
"#,
        name = escape(input.name),
        namespace = escape(input.namespace),
        database_label = DATABASE_LABEL,
        kind = input.kind.as_str(),
        image = params.image,
        port = params.port,
        container_extra = container_extra,
        memory_limit = escape(input.memory_limit),
        mount_path = params.mount_path,
        sub_path = sub_path,
        readiness_exec = params.readiness_exec,
        readiness_initial = params.readiness_initial_secs,
        readiness_period = params.readiness_period_secs,
        probe_timeout = params.probe_timeout_secs,
    )
}

fn env_from_secret(name: &str) -> String {
    format!(
        "        envFrom:\n        - secretRef:\n            name: \"{}-credentials\"\n",
        escape(name),
    )
}

/// Render an SNI-routed IngressRouteTCP exposing a database externally.
/// TLS passthrough: the route is matched on the ClientHello hostname.
pub fn ingress_route_tcp(namespace: &str, name: &str, domain: &str, kind: DatabaseKind) -> String {
    let params = kind.params(kind.default_version(), kind.default_username());
    format!(
        r#"apiVersion: traefik.io/v1alpha1
kind: IngressRouteTCP
metadata:
  name: "{name}-external"
  namespace: "{namespace}"
spec:
  entryPoints:
  - "{kind}"
  routes:
  - match: HostSNI(`{domain}`)
    services:
    - name: "{name}"
      port: {port}
  tls:
    passthrough: true
"#,
        name = escape(name),
        namespace = escape(namespace),
        kind = kind.as_str(),
        domain = escape(domain),
        port = params.port,
    )
}
