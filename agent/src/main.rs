//! DeployPilot Agent - Entry Point
//!
//! A node-resident agent for the DeployPilot platform. Runs on hosts with
//! Docker and K3s, executing deployment commands issued by the control plane.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use dpagent::app::options::{AppOptions, Settings};
use dpagent::app::run::run;
use dpagent::logs::{init_logging, LogOptions};
use dpagent::shell;
use dpagent::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        println!("{}", serde_json::to_string_pretty(&version).unwrap());
        return;
    }

    // Check on-host dependencies and exit
    if cli_args.contains_key("diagnostic") || cli_args.contains_key("diag") {
        run_diagnostic().await;
        return;
    }

    // Run the agent starting here

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        println!("Failed to initialize logging: {e}");
    }

    info!(
        "Running DeployPilot agent v{} against {}",
        version.version, settings.backend_url
    );

    let options = AppOptions::from_settings(&settings);
    let result = run(options, await_shutdown_signal()).await;
    if let Err(e) = result {
        error!("Failed to run the agent: {e}");
    }
}

/// Probe every on-host tool the agent drives and report what is missing
async fn run_diagnostic() {
    let probes = [
        ("git", "git --version"),
        ("docker", "docker version --format '{{.Server.Version}}'"),
        ("kubectl", "kubectl version --client --output=yaml"),
        ("k3s", "k3s --version"),
        ("pg_dump", "pg_dump --version"),
        ("mongodump", "mongodump --version"),
    ];

    for (name, cmd) in probes {
        let result = shell::run(cmd, Duration::from_secs(10)).await;
        if result.success {
            let first_line = result.stdout.lines().next().unwrap_or("ok");
            println!("{:<10} ok       {}", name, first_line);
        } else {
            println!(
                "{:<10} MISSING  {}",
                name,
                result.error.unwrap_or_default()
            );
        }
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).unwrap();
        let mut sigint = signal(SignalKind::interrupt()).unwrap();

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Ctrl+C received, shutting down...");
    }
}
