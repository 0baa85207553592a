//! Detection unit tests

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use dpagent::build::detect::{detect, detect_package_manager, resolve_output_dir};
use dpagent::models::build::{BuildSpec, Framework, PackageManager};

fn spec(framework: Framework) -> BuildSpec {
    BuildSpec {
        app_name: "hello".to_string(),
        deployment_id: "d1".to_string(),
        git_repo_url: "https://github.com/acme/hello.git".to_string(),
        git_branch: "main".to_string(),
        git_token: None,
        framework,
        build_command: None,
        start_command: None,
        output_directory: None,
        port: 3000,
        env_vars: HashMap::new(),
        nuxt_major_version: None,
    }
}

fn write_package_json(dir: &Path, contents: &str) {
    fs::write(dir.join("package.json"), contents).unwrap();
}

#[test]
fn lockfile_priority_prefers_pnpm() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("pnpm-lock.yaml"), "").unwrap();
    fs::write(dir.path().join("yarn.lock"), "").unwrap();
    fs::write(dir.path().join("package-lock.json"), "{}").unwrap();

    assert_eq!(
        detect_package_manager(dir.path()),
        (PackageManager::Pnpm, true)
    );
}

#[test]
fn lockfile_priority_yarn_over_npm() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("yarn.lock"), "").unwrap();
    fs::write(dir.path().join("package-lock.json"), "{}").unwrap();

    assert_eq!(
        detect_package_manager(dir.path()),
        (PackageManager::Yarn, true)
    );
}

#[test]
fn npm_without_lockfile() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(
        detect_package_manager(dir.path()),
        (PackageManager::Npm, false)
    );
}

#[test]
fn port_detection_from_start_script() {
    let dir = tempfile::tempdir().unwrap();
    write_package_json(
        dir.path(),
        r#"{"scripts": {"start": "PORT=5006 node server.js"}}"#,
    );

    let detection = detect(dir.path(), &spec(Framework::Nodejs));
    assert_eq!(detection.script_port, Some(5006));
}

#[test]
fn port_detection_falls_back_to_dev_script() {
    let dir = tempfile::tempdir().unwrap();
    write_package_json(
        dir.path(),
        r#"{"scripts": {"start": "node server.js", "dev": "vite --port 5173"}}"#,
    );

    let detection = detect(dir.path(), &spec(Framework::Vite));
    assert_eq!(detection.script_port, Some(5173));
}

#[test]
fn static_demotion_when_start_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    write_package_json(dir.path(), r#"{"scripts": {"build": "webpack"}}"#);

    let detection = detect(dir.path(), &spec(Framework::Nodejs));
    assert_eq!(detection.framework, Framework::Static);
}

#[test]
fn static_demotion_when_start_is_a_static_server() {
    let dir = tempfile::tempdir().unwrap();
    write_package_json(
        dir.path(),
        r#"{"scripts": {"build": "webpack", "start": "npx serve dist"}}"#,
    );

    let detection = detect(dir.path(), &spec(Framework::Nodejs));
    assert_eq!(detection.framework, Framework::Static);
}

#[test]
fn static_demotion_when_start_reruns_the_build() {
    let dir = tempfile::tempdir().unwrap();
    write_package_json(
        dir.path(),
        r#"{"scripts": {"build": "webpack", "start": "npm run build"}}"#,
    );

    let detection = detect(dir.path(), &spec(Framework::Nodejs));
    assert_eq!(detection.framework, Framework::Static);
}

#[test]
fn no_demotion_for_a_real_server() {
    let dir = tempfile::tempdir().unwrap();
    write_package_json(
        dir.path(),
        r#"{"scripts": {"build": "tsc", "start": "node dist/index.js"}}"#,
    );

    let detection = detect(dir.path(), &spec(Framework::Nodejs));
    assert_eq!(detection.framework, Framework::Nodejs);
}

#[test]
fn output_dir_search_is_ordered() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("out")).unwrap();
    fs::create_dir(dir.path().join("build")).unwrap();

    // `build` precedes `out` in the candidate order.
    assert_eq!(resolve_output_dir(dir.path()), "build");
}

#[test]
fn output_dir_defaults_to_dist() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(resolve_output_dir(dir.path()), "dist");
}

#[test]
fn declared_output_dir_wins() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("build")).unwrap();
    write_package_json(dir.path(), r#"{"scripts": {"build": "ng build"}}"#);

    let mut spec = spec(Framework::Angular);
    spec.output_directory = Some("dist/my-app".to_string());

    let detection = detect(dir.path(), &spec);
    assert_eq!(detection.output_directory, "dist/my-app");
}

#[test]
fn nuxt_version_from_package_json() {
    let dir = tempfile::tempdir().unwrap();
    write_package_json(
        dir.path(),
        r#"{"dependencies": {"nuxt": "^2.15.0"}, "scripts": {"build": "nuxt build", "start": "nuxt start"}}"#,
    );

    let detection = detect(dir.path(), &spec(Framework::Nuxt));
    assert_eq!(detection.nuxt_major, 2);
}

#[test]
fn nuxt_version_defaults_to_3() {
    let dir = tempfile::tempdir().unwrap();
    write_package_json(dir.path(), r#"{"dependencies": {}}"#);

    let detection = detect(dir.path(), &spec(Framework::Nuxt));
    assert_eq!(detection.nuxt_major, 3);
}

#[test]
fn dockerfile_presence_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Dockerfile"), "FROM scratch\n").unwrap();
    write_package_json(dir.path(), "{}");

    let detection = detect(dir.path(), &spec(Framework::Docker));
    assert!(detection.has_dockerfile);
}
