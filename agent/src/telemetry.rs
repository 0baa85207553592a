//! Resource collection
//!
//! Host numbers come from the `df -BG /` and `free -m` probes the platform
//! standardizes on, with sysinfo filling in CPU data; cluster and database
//! numbers come from kubectl. Probe failures degrade to partial snapshots.

use std::time::Duration;

use sysinfo::System;

use crate::kube::manifests::DATABASE_LABEL;
use crate::models::agent::{DatabaseResource, HostResources, ResourceSnapshot};
use crate::shell;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const KUBECTL_TIMEOUT: Duration = Duration::from_secs(30);

/// Host resources for the registration request
pub fn host_resources() -> HostResources {
    let mut sys = System::new_all();
    sys.refresh_all();

    let disks = sysinfo::Disks::new_with_refreshed_list();
    let disk_gb = disks
        .iter()
        .map(|disk| disk.total_space())
        .sum::<u64>()
        / 1_000_000_000;

    HostResources {
        cpu_cores: sys.cpus().len(),
        ram_mb: sys.total_memory() / (1024 * 1024),
        disk_gb,
    }
}

/// Full host + cluster + database snapshot for heartbeats and reports
pub async fn collect_snapshot() -> ResourceSnapshot {
    let mut sys = System::new_all();
    sys.refresh_all();

    let mut snapshot = ResourceSnapshot {
        cpu_cores: sys.cpus().len(),
        cpu_usage_percent: sys.global_cpu_usage(),
        ..ResourceSnapshot::default()
    };

    let disk = shell::run_args("df", &["-BG", "/"], PROBE_TIMEOUT).await;
    if disk.success {
        if let Some((total, used)) = parse_df(&disk.stdout) {
            snapshot.disk_total_gb = total;
            snapshot.disk_used_gb = used;
        }
    }

    let memory = shell::run_args("free", &["-m"], PROBE_TIMEOUT).await;
    if memory.success {
        if let Some((total, used)) = parse_free(&memory.stdout) {
            snapshot.ram_total_mb = total;
            snapshot.ram_used_mb = used;
        }
    }

    snapshot.pod_count = pod_count().await;
    snapshot.databases = list_databases().await;

    snapshot
}

/// Parse `df -BG /` output into (total_gb, used_gb)
pub fn parse_df(output: &str) -> Option<(u64, u64)> {
    let row = output.lines().nth(1)?;
    let fields: Vec<&str> = row.split_whitespace().collect();
    let total = fields.get(1)?.trim_end_matches('G').parse().ok()?;
    let used = fields.get(2)?.trim_end_matches('G').parse().ok()?;
    Some((total, used))
}

/// Parse `free -m` output into (total_mb, used_mb)
pub fn parse_free(output: &str) -> Option<(u64, u64)> {
    let row = output
        .lines()
        .find(|line| line.starts_with("Mem:"))?;
    let fields: Vec<&str> = row.split_whitespace().collect();
    let total = fields.get(1)?.parse().ok()?;
    let used = fields.get(2)?.parse().ok()?;
    Some((total, used))
}

async fn pod_count() -> usize {
    let result = shell::run_args(
        "kubectl",
        &["get", "pods", "-A", "--no-headers"],
        KUBECTL_TIMEOUT,
    )
    .await;

    if !result.success {
        return 0;
    }
    result.stdout.lines().filter(|l| !l.trim().is_empty()).count()
}

async fn list_databases() -> Vec<DatabaseResource> {
    let selector = DATABASE_LABEL.to_string();
    let columns = format!(
        "NS:.metadata.namespace,NAME:.metadata.name,KIND:.metadata.labels['{}']",
        DATABASE_LABEL.replace('.', "\\.")
    );
    let result = shell::run_args(
        "kubectl",
        &[
            "get",
            "statefulsets",
            "-A",
            "-l",
            &selector,
            "--no-headers",
            "-o",
            &format!("custom-columns={}", columns),
        ],
        KUBECTL_TIMEOUT,
    )
    .await;

    if !result.success {
        return Vec::new();
    }

    result
        .stdout
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [namespace, name, kind] => Some(DatabaseResource {
                    name: (*name).to_string(),
                    namespace: (*namespace).to_string(),
                    kind: (*kind).to_string(),
                }),
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_df() {
        let output = "Filesystem     1G-blocks  Used Available Use% Mounted on\n\
                      /dev/vda1            80G   23G       57G  29% /";
        assert_eq!(parse_df(output), Some((80, 23)));
    }

    #[test]
    fn test_parse_free() {
        let output = "               total        used        free      shared  buff/cache   available\n\
                      Mem:            7951        2410        3210          12        2330        5241\n\
                      Swap:              0           0           0";
        assert_eq!(parse_free(output), Some((7951, 2410)));
    }
}
