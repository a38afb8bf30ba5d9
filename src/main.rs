//! loghost - native messaging host
//!
//! Launched by the browser with stdin/stdout wired to an extension. Reads
//! length-prefixed JSON requests, appends lines to log files and answers each
//! request in order. Diagnostics go to stderr or a log file, never stdout.

use clap::Parser;
use loghost_host::{
    AppendHandler, Config, Dispatcher, Host, LoggingConfig, OsFileSystem, Termination,
};
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "loghost")]
#[command(about = "Native messaging host that appends lines to log files")]
#[command(version)]
struct Cli {
    /// YAML config file
    #[arg(short, long, env = "LOGHOST_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter directive (overrides config and LOGHOST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Native window handle passed by some browsers on Windows
    #[arg(long, hide = true)]
    parent_window: Option<String>,

    /// Caller identification appended by the browser (origin, or manifest
    /// path and extension id)
    caller: Vec<String>,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(file) = &self.log_file {
            config.logging.file = Some(file.clone());
        }
    }
}

fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("warn"));

    match &config.file {
        Some(path) => {
            let name = path
                .file_name()
                .ok_or_else(|| format!("log file has no file name: {}", path.display()))?;
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));

            // Missing directories are created by the appender.
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(name.to_string_lossy())
                .build(dir)?;

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(appender)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(io::stderr)
                .init();
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = Config::load_from(cli.config.as_deref())?;
    cli.apply(&mut config);
    init_logging(&config.logging)?;

    tracing::info!(caller = ?cli.caller, "loghost starting");
    if let Some(path) = &cli.config {
        tracing::info!("Loaded config from {}", path.display());
    }
    if !config.append.allowed_dirs.is_empty() {
        tracing::info!(
            "  Appends restricted to {} director(ies)",
            config.append.allowed_dirs.len()
        );
    }

    let dispatcher = Dispatcher::new(AppendHandler::with_config(
        OsFileSystem,
        config.append.clone(),
    ));
    let host = Host::new(io::stdin().lock(), io::stdout().lock(), dispatcher)
        .with_max_payload(config.protocol.max_payload());

    let summary = match host.run() {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("Response channel failed: {}", e);
            return Err(e.into());
        }
    };

    match &summary.termination {
        Termination::EndOfStream => tracing::info!("Input closed"),
        Termination::DecodeFailed(e) => tracing::debug!("Stopped on undecodable frame: {}", e),
    }
    tracing::info!(
        requests = summary.requests,
        failures = summary.failures,
        lines = summary.lines_appended,
        "loghost shutdown complete"
    );

    Ok(())
}
