mod request;
mod state;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use officeflow_engine::{
    Clock, Engine, EngineConfig, FixedClock, StaticDirectory, SystemClock, WorkflowError,
};
use officeflow_storage::{MemoryStorage, WorkflowStorage};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::request::Request;

/// Environment variable holding the log filter (`tracing` directives).
const ENV_LOG: &str = "OFFICEFLOW_LOG";

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Office workflow engine: IT tickets and performance reviews.
#[derive(Parser)]
#[command(
    name = "officeflow",
    version,
    about = "Office workflow engine: IT tickets and performance reviews"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON list of workflow requests against a state file
    Run {
        /// Path to the requests JSON file
        requests: PathBuf,
        /// Path to the state JSON file (created if missing)
        #[arg(long, default_value = "officeflow-state.json")]
        state: PathBuf,
        /// Path to the directory JSON file (employees, divisions, plans)
        #[arg(long)]
        directory: PathBuf,
        /// Path to an engine configuration TOML file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Fixed RFC 3339 instant to use as "now"
        #[arg(long)]
        now: Option<String>,
    },

    /// Print a ticket's audit trail
    History {
        /// Ticket id
        ticket_id: i64,
        /// Path to the state JSON file
        #[arg(long, default_value = "officeflow-state.json")]
        state: PathBuf,
    },

    /// Print the effective engine configuration
    Config {
        /// Path to an engine configuration TOML file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run {
            requests,
            state,
            directory,
            config,
            now,
        } => rt.block_on(cmd_run(
            RunOptions {
                requests: &requests,
                state: &state,
                directory: &directory,
                config: config.as_deref(),
                now: now.as_deref(),
            },
            cli.output,
            cli.quiet,
        )),
        Commands::History { ticket_id, state } => {
            rt.block_on(cmd_history(ticket_id, &state, cli.output))
        }
        Commands::Config { config } => cmd_config(config.as_deref(), cli.output),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(msg) => {
            report_error(&msg, cli.output, cli.quiet);
            process::exit(1);
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

struct RunOptions<'a> {
    requests: &'a Path,
    state: &'a Path,
    directory: &'a Path,
    config: Option<&'a Path>,
    now: Option<&'a str>,
}

/// Replay every request, save the state, and report whether all succeeded.
async fn cmd_run(opts: RunOptions<'_>, output: OutputFormat, quiet: bool) -> Result<bool, String> {
    let config = EngineConfig::load(opts.config).map_err(|e| format!("error: {}", e))?;
    let directory = StaticDirectory::load(opts.directory).map_err(|e| format!("error: {}", e))?;
    let clock: Arc<dyn Clock> = match opts.now {
        Some(raw) => {
            let at = OffsetDateTime::parse(raw, &Rfc3339)
                .map_err(|e| format!("error: invalid --now '{}': {}", raw, e))?;
            Arc::new(FixedClock(at))
        }
        None => Arc::new(SystemClock),
    };

    let text = std::fs::read_to_string(opts.requests).map_err(|e| {
        format!(
            "error reading requests file '{}': {}",
            opts.requests.display(),
            e
        )
    })?;
    let requests: Vec<Request> = serde_json::from_str(&text).map_err(|e| {
        format!(
            "error: invalid requests in {}: {}",
            opts.requests.display(),
            e
        )
    })?;

    let storage = MemoryStorage::from_state(state::load(opts.state)?);
    let engine = Engine::new(storage, directory, config).with_clock(clock);

    let mut failed = 0;
    for (index, request) in requests.into_iter().enumerate() {
        let op = request.op();
        match request.execute(&engine).await {
            Ok(reply) => match output {
                OutputFormat::Text => {
                    if !quiet {
                        println!("[{}] {}: {}", index, op, reply.text());
                    }
                }
                OutputFormat::Json => {
                    let line = serde_json::json!({
                        "index": index,
                        "op": op,
                        "ok": true,
                        "result": reply,
                    });
                    println!("{}", line);
                }
            },
            Err(e) => {
                failed += 1;
                match output {
                    OutputFormat::Text => println!("[{}] {}: error: {}", index, op, e),
                    OutputFormat::Json => println!("{}", error_json(index, op, &e)),
                }
            }
        }
    }

    let state = engine.storage().state().await;
    state::save(opts.state, &state)?;
    info!(path = %opts.state.display(), failed, "state saved");
    Ok(failed == 0)
}

fn error_kind(e: &WorkflowError) -> &'static str {
    match e {
        WorkflowError::Validation(_) => "validation",
        WorkflowError::Authorization => "authorization",
        WorkflowError::NotFound { .. } => "not_found",
        WorkflowError::Conflict(_) => "conflict",
        WorkflowError::State { .. } => "state",
        WorkflowError::Storage(_) => "storage",
    }
}

fn error_json(index: usize, op: &str, e: &WorkflowError) -> serde_json::Value {
    let mut value = serde_json::json!({
        "index": index,
        "op": op,
        "ok": false,
        "kind": error_kind(e),
        "error": e.to_string(),
    });
    if let WorkflowError::Validation(fields) = e {
        value["fields"] = serde_json::json!(fields);
    }
    value
}

/// Operator view of a ticket's trail, read straight from the state file.
async fn cmd_history(
    ticket_id: i64,
    state_path: &Path,
    output: OutputFormat,
) -> Result<bool, String> {
    let storage = MemoryStorage::from_state(state::load(state_path)?);
    let ticket = storage
        .get_ticket(ticket_id)
        .await
        .map_err(|e| format!("error: {}", e))?;
    let events = storage
        .list_ticket_events(ticket_id)
        .await
        .map_err(|e| format!("error: {}", e))?;
    match output {
        OutputFormat::Text => {
            println!("{} {}: {}", ticket.ticket_no, ticket.title, ticket.status);
            for event in &events {
                println!(
                    "  {} {} (by {}): {}",
                    event.created_at,
                    event.status_label,
                    event.actor_id,
                    event.remarks.replace('\n', "; ")
                );
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({ "ticket": ticket, "events": events });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
    }
    Ok(true)
}

fn cmd_config(path: Option<&Path>, output: OutputFormat) -> Result<bool, String> {
    let config = EngineConfig::load(path).map_err(|e| format!("error: {}", e))?;
    match output {
        OutputFormat::Text => print!("{}", config.to_toml_string()),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&config).unwrap_or_default()
        ),
    }
    Ok(true)
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
