//! `clangd-query`: the CLI entry point (spec.md §6 "CLI surface").
//!
//! Grounded on the `clawde-io-apps` pack entry's `clap::Parser`/`Subcommand`
//! always-on-daemon CLI shape, adapted to this spec's exact command table
//! and hidden `daemon` subcommand.

use clap::{Parser, Subcommand};
use clangd_query::paths::find_project_root;
use clangd_query::{client, daemon, logging};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "clangd-query", about = "Code-intelligence CLI for C++ codebases, backed by clangd")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Cap the number of results a command returns, where applicable.
    #[arg(long, global = true)]
    limit: Option<usize>,

    /// Per-request timeout in seconds (default: 30, enforced daemon-side).
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Verbose logging.
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Fuzzy workspace-symbol search.
    Search { query: String },
    /// Declaration and definition of a resolved symbol.
    Show { symbol: String },
    /// `show`, plus the enclosing function or class body.
    View { symbol: String },
    /// All references to a resolved symbol.
    Usages { symbol: String },
    /// Type hierarchy (supertypes and subtypes) of a resolved symbol.
    Hierarchy { symbol: String },
    /// Declaration and documentation of a resolved symbol.
    Signature { symbol: String },
    /// Public members of a resolved class or struct.
    Interface { symbol: String },
    /// Daemon uptime, pid, and request counters.
    Status,
    /// Tail the daemon's in-memory log ring.
    Logs {
        #[arg(long, default_value = "info")]
        level: String,
    },
    /// Ask the daemon to shut down.
    Shutdown,
    /// Run the daemon in the foreground for `project_root` (spec.md §6).
    #[command(hide = true)]
    Daemon {
        #[arg(long)]
        project_root: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Command::Daemon { project_root } = cli.command {
        return match daemon::run(project_root, cli.verbose).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("daemon error: {e:?}");
                ExitCode::FAILURE
            }
        };
    }

    logging::init_stderr(cli.verbose);

    let Some(project_root) = find_project_root(&std::env::current_dir().unwrap_or_default()) else {
        eprintln!("no CMakeLists.txt found in this directory or any parent; not a CMake project");
        return ExitCode::FAILURE;
    };

    let (method, params) = match wire_request(&cli.command, cli.limit) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let timeout = std::time::Duration::from_secs(cli.timeout.unwrap_or(30));
    match tokio::time::timeout(timeout, client::send(&project_root, method, params)).await {
        Ok(Ok(result)) => {
            print_result(method, &result);
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            eprintln!("{e:?}");
            ExitCode::FAILURE
        }
        Err(_) => {
            eprintln!("timed out waiting for the daemon after {}s", timeout.as_secs());
            ExitCode::FAILURE
        }
    }
}

/// Build the wire method name and params for every non-`daemon` subcommand
/// (spec.md §6's request/response table).
fn wire_request(command: &Command, limit: Option<usize>) -> anyhow::Result<(&'static str, Value)> {
    Ok(match command {
        Command::Search { query } => ("search", json!({ "query": query, "limit": limit })),
        Command::Show { symbol } => ("show", json!({ "symbol": symbol, "limit": limit })),
        Command::View { symbol } => ("view", json!({ "symbol": symbol, "limit": limit })),
        Command::Usages { symbol } => ("usages", json!({ "symbol": symbol, "limit": limit })),
        Command::Hierarchy { symbol } => ("hierarchy", json!({ "symbol": symbol, "limit": limit })),
        Command::Signature { symbol } => ("signature", json!({ "symbol": symbol, "limit": limit })),
        Command::Interface { symbol } => ("interface", json!({ "symbol": symbol, "limit": limit })),
        Command::Status => ("status", json!({})),
        Command::Logs { level } => ("logs", json!({ "level": level })),
        Command::Shutdown => ("shutdown", json!({})),
        Command::Daemon { .. } => anyhow::bail!("daemon subcommand is handled before request dispatch"),
    })
}

/// `search`/`show`/.../`interface` carry their rendered text in `output`;
/// the three built-ins have their own small, self-describing shapes.
fn print_result(method: &str, result: &Value) {
    match method {
        "status" => println!("{}", serde_json::to_string_pretty(result).unwrap_or_default()),
        "logs" => {
            if let Some(logs) = result.get("logs").and_then(|l| l.as_str()) {
                print!("{logs}");
            }
        }
        "shutdown" => {
            if let Some(status) = result.get("status").and_then(|s| s.as_str()) {
                println!("{status}");
            }
        }
        _ => {
            if let Some(output) = result.get("output").and_then(|o| o.as_str()) {
                print!("{output}");
            }
        }
    }
}
