//! loghost-cli - Command-line interface for loghost
//!
//! Starts a host the way a browser would and sends it requests.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use loghost_client::HostCommand;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "loghost-cli")]
#[command(about = "Command-line interface for the loghost native messaging host")]
#[command(version)]
struct Cli {
    /// Host executable to launch
    #[arg(long, env = "LOGHOST_BIN", default_value = "loghost", global = true)]
    host: PathBuf,

    /// Caller origin passed to the host as its first argument
    #[arg(long, default_value = "loghost-cli", global = true)]
    origin: String,

    /// Show the host's stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Append lines to a file (reads stdin when no lines are given)
    Append {
        /// Target file
        #[arg(short, long)]
        path: String,

        /// Lines to append
        lines: Vec<String>,
    },

    /// Send a raw JSON request (or @file.json to read from file)
    Send {
        /// Request JSON
        request: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let command = HostCommand::new(&cli.host)
        .arg(&cli.origin)
        .with_inherit_stderr(cli.verbose);

    match commands::execute(&command, cli.command) {
        Ok(output) => {
            println!("{}", output.text);
            if output.ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
