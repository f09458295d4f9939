//! sqldeploy - Entry Point
//!
//! Runs SQL change scripts against one or more registered databases, serially or in
//! parallel, and prints an aggregated error summary.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing::{error, info};

use sqldeploy::app::options::AppOptions;
use sqldeploy::app::run::run;
use sqldeploy::filesys::file::File;
use sqldeploy::logs::{init_logging, LogLevel, LogOptions};
use sqldeploy::models::request::{split_names, DeploymentRequest, RequestFlags};
use sqldeploy::report::summary::render_summary;
use sqldeploy::storage::settings::Settings;
use sqldeploy::utils::version_info;

/// Exit status for configuration and bootstrap errors
const EXIT_CONFIG: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "sqldeploy")]
#[command(about = "Run SQL change scripts against registered databases", long_about = None)]
#[command(version)]
struct Cli {
    /// SQL scripts, executed in this order on every target
    scripts: Vec<PathBuf>,

    /// Target databases; one value may hold several names separated by any non-alphanumeric character
    #[arg(short, long = "db", value_name = "NAMES")]
    db: Vec<String>,

    /// Identity used to connect
    #[arg(short, long, default_value = "SYS")]
    user: String,

    /// Run all targets concurrently
    #[arg(short, long)]
    parallel: bool,

    /// Application the targets must be registered for
    #[arg(long)]
    app: Option<String>,

    /// Skip the restricted SQL check
    #[arg(long)]
    no_check: bool,

    /// Refuse targets registered as production
    #[arg(long)]
    check_prod: bool,

    /// Ticket that receives the log files as attachments
    #[arg(long)]
    ticket: Option<String>,

    /// JSON settings file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for the log files
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Kill the command processor after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Write the deployment report as JSON
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Command processor command line
    #[arg(long, env = "SQLCL")]
    sqlcl: Option<String>,

    #[arg(long, env = "ORACLE_HOME")]
    oracle_home: Option<String>,

    #[arg(long, env = "TNS_ADMIN")]
    tns_admin: Option<PathBuf>,

    /// Database registry base URL
    #[arg(long, env = "SQLDEPLOY_REGISTRY_URL")]
    registry_url: Option<String>,

    #[arg(long, env = "SQLDEPLOY_REGISTRY_USER")]
    registry_user: Option<String>,

    #[arg(long, env = "SQLDEPLOY_REGISTRY_PASSWORD", hide_env_values = true)]
    registry_password: Option<String>,

    /// Issue tracker base URL
    #[arg(long, env = "SQLDEPLOY_TRACKER_URL")]
    tracker_url: Option<String>,

    #[arg(long, env = "SQLDEPLOY_TRACKER_USER")]
    tracker_user: Option<String>,

    #[arg(long, env = "SQLDEPLOY_TRACKER_PASSWORD", hide_env_values = true)]
    tracker_password: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SQLDEPLOY_LOG_LEVEL")]
    log_level: Option<LogLevel>,

    /// Emit diagnostics as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Print version and build information as JSON
    #[arg(long)]
    version_info: bool,
}

impl Cli {
    /// Overlay command line and environment values onto the settings file
    fn apply(&self, settings: &mut Settings) {
        if let Some(level) = &self.log_level {
            settings.log_level = level.clone();
        }
        if let Some(dir) = &self.log_dir {
            settings.log_dir = dir.clone();
        }
        if self.timeout_secs.is_some() {
            settings.tool.timeout_secs = self.timeout_secs;
        }
        overlay(&mut settings.tool.command, &self.sqlcl);
        overlay(&mut settings.tool.oracle_home, &self.oracle_home);
        overlay(&mut settings.tool.tns_admin, &self.tns_admin);
        overlay(&mut settings.registry.base_url, &self.registry_url);
        overlay(&mut settings.registry.user, &self.registry_user);
        overlay(&mut settings.registry.password, &self.registry_password);
        overlay(&mut settings.tracker.base_url, &self.tracker_url);
        overlay(&mut settings.tracker.user, &self.tracker_user);
        overlay(&mut settings.tracker.password, &self.tracker_password);
    }

    fn request(&self) -> DeploymentRequest {
        let targets: Vec<String> = self.db.iter().flat_map(|value| split_names(value)).collect();
        DeploymentRequest::new(targets, self.scripts.clone(), self.user.clone())
            .with_flags(RequestFlags {
                enforce_restricted_check: !self.no_check,
                enforce_production_check: self.check_prod,
                run_parallel: self.parallel,
            })
            .with_required_app(self.app.clone())
            .with_ticket(self.ticket.clone())
    }
}

fn overlay<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        target.clone_from(value);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version_info {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(info) => println!("{info}"),
            Err(e) => eprintln!("Failed to render version info: {e}"),
        }
        return ExitCode::SUCCESS;
    }

    match deploy(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(EXIT_CONFIG)
        }
    }
}

async fn deploy(cli: Cli) -> Result<u8> {
    // Settings file, then command line and environment on top
    let mut settings = match &cli.config {
        Some(path) => File::new(path)
            .read_json::<Settings>()
            .await
            .with_context(|| format!("Unable to read settings file {}", path.display()))?,
        None => Settings::default(),
    };
    cli.apply(&mut settings);

    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: cli.log_json,
    };
    if let Err(e) = init_logging(log_options) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let options = AppOptions::from_settings(&settings);
    let request = cli.request();
    info!("Running sqldeploy {} with options: {:?}", version_info().version, options);

    let report = run(&request, &options)
        .await
        .context("Deployment request rejected")?;

    print!("{}", render_summary(&report));

    if let Some(path) = &cli.report {
        File::new(path)
            .write_json(&report)
            .await
            .with_context(|| format!("Unable to write report {}", path.display()))?;
    }

    Ok(report.exit_code() as u8)
}
