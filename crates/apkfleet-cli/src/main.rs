//! apkfleet - bulk APK management for adb-connected device fleets
//!
//! ## Commands
//!
//! - `devices`: Write the connected-device registry (CSV)
//! - `apps`: Write the list of installed third-party packages
//! - `download`: Pull package APKs from a device into `apks/<package>/`
//! - `install`: Install packages on many devices in parallel

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, Level};

use apkfleet_core::config::FleetConfig;
use apkfleet_core::inputs::parse_package_list;
use apkfleet_core::orchestrator::DEFAULT_CONCURRENCY;
use apkfleet_core::retry::DEFAULT_MAX_ATTEMPTS;
use apkfleet_core::telemetry::DEFAULT_LOG_FILE;
use apkfleet_core::{
    download_packages, init_tracing, list_devices, list_installed_packages, load_package_list,
    write_device_registry, write_package_list, AdbBridge, DeviceSource, InstallOptions,
    Orchestrator, OrchestratorConfig, Reporter, RetryPolicy,
};

#[derive(Parser)]
#[command(name = "apkfleet")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bulk APK management for adb-connected devices", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Bridge executable
    #[arg(long, global = true, env = "APKFLEET_ADB", default_value = "adb")]
    adb: String,

    /// Append-only diagnostic log file
    #[arg(long, global = true, env = "APKFLEET_LOG_FILE", default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    /// Do not write the diagnostic log file
    #[arg(long, global = true)]
    no_log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write connected devices to a CSV registry
    Devices {
        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write installed third-party packages, one per line
    Apps {
        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Target device id (default: the only connected device)
        #[arg(short, long)]
        device: Option<String>,
    },

    /// Download package APKs from a device
    Download {
        #[command(flatten)]
        packages: PackageArgs,

        /// Source device id (default: the only connected device)
        #[arg(short, long)]
        device: Option<String>,

        /// Artifact root directory
        #[arg(long, env = "APKFLEET_APK_ROOT", default_value = "apks")]
        apk_root: PathBuf,

        /// Attempts per pulled file
        #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
        max_attempts: u32,
    },

    /// Install packages on many devices in parallel
    Install {
        #[command(flatten)]
        devices: DeviceArgs,

        /// Package list file (as written by `apps`)
        #[arg(short, long)]
        file: PathBuf,

        /// Artifact root directory
        #[arg(long, env = "APKFLEET_APK_ROOT", default_value = "apks")]
        apk_root: PathBuf,

        /// Devices installed concurrently
        #[arg(long, env = "APKFLEET_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,

        /// Attempts per package install
        #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
        max_attempts: u32,

        /// Delay between attempts in milliseconds
        #[arg(long, default_value_t = 1000)]
        retry_delay_ms: u64,

        /// Grant all requested runtime permissions (-g)
        #[arg(short, long)]
        grant_permissions: bool,

        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct DeviceArgs {
    /// Device ids
    #[arg(short, long, num_args = 1..)]
    devices: Vec<String>,

    /// Device registry CSV (as written by `devices`)
    #[arg(short, long)]
    csv: Option<PathBuf>,
}

impl DeviceArgs {
    fn source(self) -> DeviceSource {
        match self.csv {
            Some(path) => DeviceSource::Registry(path),
            None => DeviceSource::Explicit(self.devices),
        }
    }
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct PackageArgs {
    /// Package names
    #[arg(short, long, num_args = 1..)]
    packages: Vec<String>,

    /// Package list file (as written by `apps`)
    #[arg(short, long)]
    file: Option<PathBuf>,
}

impl PackageArgs {
    fn resolve(self) -> Result<Vec<String>> {
        match self.file {
            Some(path) => Ok(load_package_list(&path)?),
            None => Ok(parse_package_list(&self.packages.join("\n"))),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let config = fleet_config(&cli);
    if let Err(e) = init_tracing(cli.json_logs, level, config.log_file.as_deref()) {
        eprintln!("error: cannot open log file {}: {e}", cli.log_file.display());
        return ExitCode::FAILURE;
    }

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = format!("{e:#}"), "command failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn fleet_config(cli: &Cli) -> FleetConfig {
    FleetConfig {
        bridge_executable: cli.adb.clone(),
        log_file: (!cli.no_log_file).then(|| cli.log_file.clone()),
        ..FleetConfig::default()
    }
}

async fn run(command: Commands, mut config: FleetConfig) -> Result<()> {
    match command {
        Commands::Devices { output } => cmd_devices(&config.bridge(), &output).await,
        Commands::Apps { output, device } => {
            cmd_apps(&config.bridge(), &output, device.as_deref()).await
        }
        Commands::Download {
            packages,
            device,
            apk_root,
            max_attempts,
        } => {
            config.artifact_root = apk_root;
            config.install.retry.max_attempts = max_attempts;
            cmd_download(&config, packages.resolve()?, device.as_deref()).await
        }
        Commands::Install {
            devices,
            file,
            apk_root,
            concurrency,
            max_attempts,
            retry_delay_ms,
            grant_permissions,
            json,
        } => {
            config.artifact_root = apk_root;
            config.install = OrchestratorConfig {
                concurrency_limit: concurrency,
                retry: RetryPolicy::new(max_attempts, Duration::from_millis(retry_delay_ms)),
                options: InstallOptions { grant_permissions },
            };
            cmd_install(&config, devices.source(), &file, json).await
        }
    }
}

async fn cmd_devices(bridge: &AdbBridge, output: &Path) -> Result<()> {
    let devices = list_devices(bridge).await.context("Failed to list devices")?;
    write_device_registry(output, &devices)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("{} device(s) written to {}", devices.len(), output.display());
    for device in &devices {
        println!(
            "  {}  model={}  android={}",
            device.device_id, device.model, device.android_version
        );
    }
    Ok(())
}

async fn cmd_apps(bridge: &AdbBridge, output: &Path, device: Option<&str>) -> Result<()> {
    let packages = list_installed_packages(bridge, device)
        .await
        .context("Failed to list installed packages")?;
    write_package_list(output, &packages)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("{} package(s) written to {}", packages.len(), output.display());
    Ok(())
}

async fn cmd_download(
    config: &FleetConfig,
    packages: Vec<String>,
    device: Option<&str>,
) -> Result<()> {
    let bridge = config.bridge();
    let reporter = Reporter::stdout();

    let report = download_packages(
        &bridge,
        device,
        &packages,
        &config.artifact_root,
        config.install.retry,
        &reporter,
    )
    .await
    .context("Download aborted")?;

    reporter.line(report.render_summary());
    Ok(())
}

async fn cmd_install(
    config: &FleetConfig,
    devices: DeviceSource,
    package_list: &Path,
    json: bool,
) -> Result<()> {
    let bridge = config.bridge();
    bridge
        .ensure_available()
        .await
        .context("Device bridge is not usable")?;

    let reporter = Arc::new(if json {
        Reporter::silent()
    } else {
        Reporter::stdout()
    });
    let orchestrator = Orchestrator::new(
        Arc::new(bridge),
        Arc::new(config.resolver()),
        Arc::clone(&reporter),
        config.install.clone(),
    );

    info!(config = ?config, "starting install");
    let report = orchestrator
        .install_from(&devices, package_list)
        .await
        .context("Install aborted")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        reporter.line(report.render_summary());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_fill_fleet_config() {
        let cli = Cli::try_parse_from([
            "apkfleet",
            "--adb",
            "/opt/platform-tools/adb",
            "--log-file",
            "fleet.log",
            "devices",
            "-o",
            "devices.csv",
        ])
        .unwrap();
        let config = fleet_config(&cli);
        assert_eq!(config.bridge_executable, "/opt/platform-tools/adb");
        assert_eq!(config.log_file, Some(PathBuf::from("fleet.log")));

        let cli =
            Cli::try_parse_from(["apkfleet", "--no-log-file", "devices", "-o", "devices.csv"])
                .unwrap();
        assert_eq!(fleet_config(&cli).log_file, None);
    }

    #[test]
    fn test_install_requires_exactly_one_device_source() {
        let parsed = Cli::try_parse_from(["apkfleet", "install", "-f", "pkgs.txt"]);
        assert!(parsed.is_err());

        let parsed = Cli::try_parse_from([
            "apkfleet", "install", "-d", "A", "-c", "devices.csv", "-f", "pkgs.txt",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_install_defaults() {
        let cli = Cli::try_parse_from(["apkfleet", "install", "-d", "A", "B", "-f", "pkgs.txt"])
            .unwrap();
        match cli.command {
            Commands::Install {
                devices,
                concurrency,
                max_attempts,
                retry_delay_ms,
                grant_permissions,
                ..
            } => {
                assert_eq!(
                    devices.source(),
                    DeviceSource::Explicit(vec!["A".to_string(), "B".to_string()])
                );
                assert_eq!(concurrency, 4);
                assert_eq!(max_attempts, 3);
                assert_eq!(retry_delay_ms, 1000);
                assert!(!grant_permissions);
            }
            _ => panic!("expected install"),
        }
    }

    #[test]
    fn test_download_accepts_package_names() {
        let cli = Cli::try_parse_from(["apkfleet", "download", "-p", "com.a", "com.b"]).unwrap();
        match cli.command {
            Commands::Download { packages, .. } => {
                assert_eq!(packages.resolve().unwrap(), ["com.a", "com.b"]);
            }
            _ => panic!("expected download"),
        }
    }

    #[test]
    fn test_download_reads_package_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pkgs.txt");
        std::fs::write(&path, "com.a\n\ncom.b\n").unwrap();

        let cli = Cli::try_parse_from([
            "apkfleet",
            "download",
            "-f",
            path.to_str().unwrap(),
        ])
        .unwrap();
        match cli.command {
            Commands::Download { packages, .. } => {
                assert_eq!(packages.resolve().unwrap(), ["com.a", "com.b"]);
            }
            _ => panic!("expected download"),
        }
    }
}
