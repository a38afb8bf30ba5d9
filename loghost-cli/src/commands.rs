//! Command execution.

use crate::Commands;
use colored::Colorize;
use loghost_client::{ClientError, HostCommand};
use loghost_protocol::{Frame, Response};
use serde_json::Value;
use std::io::BufRead;

/// Formatted command result.
pub struct Output {
    /// Whether the host answered `ok: true`.
    pub ok: bool,
    pub text: String,
}

/// Executes a command against a freshly started host.
pub fn execute(command: &HostCommand, cmd: Commands) -> Result<Output, Box<dyn std::error::Error>> {
    let mut host = command.spawn()?;

    let output = match cmd {
        Commands::Append { path, lines } => {
            let lines = if lines.is_empty() {
                read_stdin_lines()?
            } else {
                lines
            };
            let count = lines.len();

            match host.append(&path, lines) {
                Ok(()) => Output {
                    ok: true,
                    text: format!(
                        "{} {} line(s) to {}",
                        "Appended".green(),
                        count,
                        path.cyan()
                    ),
                },
                Err(ClientError::HostError(message)) => Output {
                    ok: false,
                    text: format_error(&message),
                },
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Send { request } => {
            let value = parse_json_arg(&request)?;
            let encoded = Frame::from_json(&value)?.encode()?;
            host.write_raw(&encoded)?;

            match host.read_response()? {
                Some(response) => format_response(&response),
                None => Output {
                    ok: false,
                    text: format!("{}", "Host closed without answering".yellow()),
                },
            }
        }
    };

    let (_, status) = host.finish()?;
    tracing::debug!("Host exited with {}", status);

    Ok(output)
}

fn read_stdin_lines() -> std::io::Result<Vec<String>> {
    std::io::stdin().lock().lines().collect()
}

/// Parses a JSON argument, reading from a file when prefixed with `@`.
fn parse_json_arg(arg: &str) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(path) = arg.strip_prefix('@') {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(serde_json::from_str(arg)?)
    }
}

fn format_error(message: &str) -> String {
    format!("{}: {}", "ERROR".red().bold(), message)
}

/// Formats a response for display.
fn format_response(response: &Response) -> Output {
    if response.ok {
        Output {
            ok: true,
            text: "OK".green().to_string(),
        }
    } else {
        Output {
            ok: false,
            text: format_error(response.error.as_deref().unwrap_or("")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_arg_inline() {
        let value = parse_json_arg(r#"{"op":"append","path":"/tmp/a.log"}"#).unwrap();
        assert_eq!(value["op"], "append");
        assert!(parse_json_arg("{not json").is_err());
    }

    #[test]
    fn test_parse_json_arg_missing_file() {
        assert!(parse_json_arg("@/nonexistent/request.json").is_err());
    }

    #[test]
    fn test_format_response() {
        colored::control::set_override(false);

        let ok = format_response(&Response::ok());
        assert!(ok.ok);
        assert_eq!(ok.text, "OK");

        let err = format_response(&Response::unknown_op());
        assert!(!err.ok);
        assert_eq!(err.text, "ERROR: unknown op");
    }
}
