//! Framework and package-manager detection over a cloned tree

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};

use crate::models::build::{BuildSpec, Framework, PackageManager};

/// Output directories probed for demoted static sites, in order
const OUTPUT_DIR_CANDIDATES: &[&str] = &["dist", "build", "public", "out", "_site", "www"];

static PORT_ENV_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"PORT=(\d+)").expect("valid regex"));
static PORT_FLAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--port[= ](\d+)").expect("valid regex"));
static PORT_SHORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)-p[= ](\d+)").expect("valid regex"));

/// What the detector learned from the cloned tree
#[derive(Debug, Clone)]
pub struct Detection {
    pub package_manager: PackageManager,
    pub has_lockfile: bool,

    /// Framework after any static-site demotion
    pub framework: Framework,

    /// Resolved output directory for static frameworks
    pub output_directory: String,

    /// Port scanned from start/dev scripts, if any
    pub script_port: Option<u16>,

    pub nuxt_major: u32,
    pub has_dockerfile: bool,
}

/// Probe the cloned tree
pub fn detect(dir: &Path, spec: &BuildSpec) -> Detection {
    let (package_manager, has_lockfile) = detect_package_manager(dir);
    let package_json = read_package_json(dir);

    let script_port = package_json.as_ref().and_then(scan_scripts_port);

    let nuxt_major = spec.nuxt_major_version.unwrap_or_else(|| {
        package_json
            .as_ref()
            .map(|pkg| nuxt_major_version(pkg))
            .unwrap_or(3)
    });

    let mut framework = spec.framework;
    if matches!(framework, Framework::Nodejs | Framework::Static) {
        if let Some(pkg) = package_json.as_ref() {
            if is_static_site(pkg, package_manager) {
                debug!("Reclassifying {} as a static site", framework);
                framework = Framework::Static;
            }
        }
    }

    let output_directory = match spec.output_directory.as_deref() {
        Some(declared) if !declared.is_empty() => declared.to_string(),
        _ => resolve_output_dir(dir),
    };

    let has_dockerfile = dir.join("Dockerfile").is_file();

    let detection = Detection {
        package_manager,
        has_lockfile,
        framework,
        output_directory,
        script_port,
        nuxt_major,
        has_dockerfile,
    };

    info!(
        "Detected {} project ({}, lockfile: {})",
        detection.framework,
        detection.package_manager.as_str(),
        detection.has_lockfile
    );

    detection
}

/// Lockfile priority: pnpm, then yarn, then npm
pub fn detect_package_manager(dir: &Path) -> (PackageManager, bool) {
    if dir.join("pnpm-lock.yaml").is_file() {
        (PackageManager::Pnpm, true)
    } else if dir.join("yarn.lock").is_file() {
        (PackageManager::Yarn, true)
    } else {
        (PackageManager::Npm, dir.join("package-lock.json").is_file())
    }
}

fn read_package_json(dir: &Path) -> Option<Value> {
    let raw = std::fs::read_to_string(dir.join("package.json")).ok()?;
    serde_json::from_str(&raw).ok()
}

fn script(pkg: &Value, name: &str) -> Option<String> {
    pkg.get("scripts")?
        .get(name)?
        .as_str()
        .map(str::to_string)
}

/// Scan `scripts.start`, then `scripts.dev`, for an explicit port
pub fn scan_scripts_port(pkg: &Value) -> Option<u16> {
    for name in ["start", "dev"] {
        if let Some(port) = script(pkg, name).as_deref().and_then(scan_port) {
            return Some(port);
        }
    }
    None
}

/// First match wins: `PORT=<n>`, `--port[= ]<n>`, `-p[= ]<n>`
pub fn scan_port(script: &str) -> Option<u16> {
    for re in [&*PORT_ENV_RE, &*PORT_FLAG_RE, &*PORT_SHORT_RE] {
        if let Some(captures) = re.captures(script) {
            if let Ok(port) = captures[1].parse() {
                return Some(port);
            }
        }
    }
    None
}

/// Major version of the `nuxt` dependency, defaulting to 3
pub fn nuxt_major_version(pkg: &Value) -> u32 {
    let range = ["dependencies", "devDependencies"]
        .iter()
        .find_map(|section| pkg.get(section)?.get("nuxt")?.as_str());

    range
        .and_then(|range| range.chars().find(char::is_ascii_digit))
        .and_then(|digit| digit.to_digit(10))
        .unwrap_or(3)
}

/// A nodejs/static project with a build script and no real server is a
/// static site: no start script, a start script that shells out to a local
/// static server, or a start script that just re-runs the build.
pub fn is_static_site(pkg: &Value, package_manager: PackageManager) -> bool {
    if script(pkg, "build").is_none() {
        return false;
    }

    let Some(start) = script(pkg, "start") else {
        return true;
    };

    let references_static_server = start
        .split_whitespace()
        .any(|token| matches!(token, "serve" | "live-server" | "http-server"));

    references_static_server
        || start.trim() == format!("{} run build", package_manager.as_str())
}

/// First existing candidate output directory, defaulting to `dist`
pub fn resolve_output_dir(dir: &Path) -> String {
    OUTPUT_DIR_CANDIDATES
        .iter()
        .find(|candidate| dir.join(candidate).is_dir())
        .unwrap_or(&"dist")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_port_variants() {
        assert_eq!(scan_port("PORT=5006 node server.js"), Some(5006));
        assert_eq!(scan_port("vite --port=5006"), Some(5006));
        assert_eq!(scan_port("vite --port 5006"), Some(5006));
        assert_eq!(scan_port("serve -p 5006"), Some(5006));
        assert_eq!(scan_port("serve -p=5006"), Some(5006));
    }

    #[test]
    fn test_scan_port_no_match() {
        assert_eq!(scan_port("node server.js"), None);
        assert_eq!(scan_port("next start"), None);
        // `-p` buried in another flag must not match
        assert_eq!(scan_port("tsc --project tsconfig.json"), None);
    }

    #[test]
    fn test_nuxt_major_version() {
        let pkg: Value =
            serde_json::from_str(r#"{"dependencies": {"nuxt": "^2.15.0"}}"#).unwrap();
        assert_eq!(nuxt_major_version(&pkg), 2);

        let pkg: Value =
            serde_json::from_str(r#"{"dependencies": {"nuxt": "~3.4.1"}}"#).unwrap();
        assert_eq!(nuxt_major_version(&pkg), 3);

        let pkg: Value =
            serde_json::from_str(r#"{"dependencies": {"nuxt": "latest"}}"#).unwrap();
        assert_eq!(nuxt_major_version(&pkg), 3);
    }
}
