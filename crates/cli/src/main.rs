mod apply;
mod config;
mod serve;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use revstore_storage::conformance::run_conformance_suite;
use revstore_storage::MemoryStore;
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Versioned-document upsert engine.
#[derive(Parser)]
#[command(name = "revstore", version, about = "Versioned-document upsert engine")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Enable debug logging on stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a JSON script of upsert requests against an in-memory store
    Apply {
        /// Path to the script (a JSON array of upsert requests)
        script: PathBuf,
        /// JSON array of documents to load into the store before the script runs
        #[arg(long)]
        seed: Option<PathBuf>,
    },

    /// Serve the upsert engine over HTTP
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run the store conformance suite against the in-memory backend
    Conformance,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let config = match config::read_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            report_error(&e, cli.output, cli.quiet);
            process::exit(2);
        }
    };

    match cli.command {
        Commands::Apply { script, seed } => {
            apply::cmd_apply(&script, seed.as_deref(), &config, cli.output, cli.quiet);
        }
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.server.port);
            let rt = runtime(cli.output, cli.quiet);
            if let Err(e) = rt.block_on(serve::start_server(port, config)) {
                report_error(&format!("server error: {}", e), cli.output, cli.quiet);
                process::exit(1);
            }
        }
        Commands::Conformance => cmd_conformance(cli.output, cli.quiet),
    }
}

fn cmd_conformance(output: OutputFormat, quiet: bool) {
    let rt = runtime(output, quiet);
    let report = rt.block_on(run_conformance_suite(|| async { MemoryStore::new() }));

    match output {
        OutputFormat::Text => {
            if !quiet {
                print!("{}", report);
            }
        }
        OutputFormat::Json => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                report_error(&format!("failed to serialize report: {}", e), output, quiet);
                process::exit(1);
            }
        },
    }

    if report.failed > 0 {
        process::exit(1);
    }
}

pub(crate) fn runtime(output: OutputFormat, quiet: bool) -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to create tokio runtime: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

/// Log lines go to stderr so stdout stays machine-readable.
fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
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
