//! The formula engine CLI.
//!
//! Provides the `formulac` command with the following subcommands:
//!
//! - `formulac check <expr>` - Type-check a formula and print its type
//! - `formulac eval <expr>` - Check and evaluate a formula
//!
//! Options:
//! - `--config` - Host configuration (TOML) declaring types, variables and table rows
//! - `--json` - Output diagnostics and values as JSON
//! - `--no-color` - Disable colorized output

mod host;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use formula_rt::{CancellationSignal, Engine, EngineError};
use formula_typeck::diagnostics::{render_diagnostic, DiagnosticOptions};
use formula_typeck::error::TypeError;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use crate::host::{Host, HostConfig};

const FORMULA_FILE: &str = "<formula>";

#[derive(Parser)]
#[command(name = "formulac", version, about = "The formula engine driver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Type-check a formula
    Check {
        /// The formula text
        expr: String,

        /// Host configuration file (types, variables, table rows)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output diagnostics as JSON (one object per line) instead of human-readable format
        #[arg(long)]
        json: bool,

        /// Disable colorized output
        #[arg(long = "no-color")]
        no_color: bool,
    },
    /// Check and evaluate a formula
    Eval {
        /// The formula text
        expr: String,

        /// Host configuration file (types, variables, table rows)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output diagnostics and the result as JSON
        #[arg(long)]
        json: bool,

        /// Disable colorized output
        #[arg(long = "no-color")]
        no_color: bool,
    },
}

/// Install the log subscriber. `RUST_LOG` overrides the default filter.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,formula_rt=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let (result, json) = match cli.command {
        Commands::Check {
            expr,
            config,
            json,
            no_color,
        } => {
            let opts = DiagnosticOptions {
                color: !no_color && !json,
                json,
            };
            (check(&expr, config.as_deref(), &opts), json)
        }
        Commands::Eval {
            expr,
            config,
            json,
            no_color,
        } => {
            let opts = DiagnosticOptions {
                color: !no_color && !json,
                json,
            };
            (eval(&expr, config.as_deref(), &opts), json)
        }
    };

    if let Err(e) = result {
        if json {
            let msg = serde_json::json!({
                "code": "C0001",
                "severity": "error",
                "message": e,
                "file": "",
                "spans": [],
                "fix": null
            });
            eprintln!("{}", msg);
        } else {
            eprintln!("error: {}", e);
        }
        process::exit(1);
    }
}

fn load_host(config: Option<&Path>) -> Result<Host, String> {
    let config = match config {
        Some(path) => HostConfig::from_file(path)?,
        None => HostConfig::from_str("")?,
    };
    let host = config.build()?;
    debug!(
        types = host.types.len(),
        variables = host.symbols.len(),
        "host loaded"
    );
    Ok(host)
}

/// Type-check `expr` and print its type.
fn check(expr: &str, config: Option<&Path>, opts: &DiagnosticOptions) -> Result<(), String> {
    let host = load_host(config)?;
    let engine = Engine::new(host.config.clone(), host.store.clone());
    let result = engine.check(expr, Some(&host.symbols));

    if !result.errors.is_empty() {
        report_diagnostics(expr, &result.errors, opts);
        return Err("Check failed due to errors above.".to_string());
    }
    let ty = result
        .result_type
        .map(|ty| ty.to_string())
        .unwrap_or_default();
    if opts.json {
        println!("{}", serde_json::json!({ "type": ty }));
    } else {
        println!("{}", ty);
    }
    Ok(())
}

/// Check and evaluate `expr`, printing the resulting value. Ctrl-C cancels
/// pending store writes.
fn eval(expr: &str, config: Option<&Path>, opts: &DiagnosticOptions) -> Result<(), String> {
    let host = load_host(config)?;
    let engine = Engine::new(host.config.clone(), host.store.clone());
    let runtime =
        tokio::runtime::Runtime::new().map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

    let value = runtime.block_on(async {
        let cancel = CancellationSignal::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupted, cancelling");
                on_interrupt.cancel();
            }
        });
        engine
            .eval(expr, Some(&host.symbols), &host.bindings, &cancel)
            .await
    });

    let value = match value {
        Ok(value) => value,
        Err(EngineError::Check(errors)) => {
            report_diagnostics(expr, &errors, opts);
            return Err("Evaluation failed due to errors above.".to_string());
        }
        Err(EngineError::Parse(errors)) => {
            let errors: Vec<TypeError> = errors
                .into_iter()
                .map(|e| TypeError::Syntax {
                    message: e.message,
                    span: e.span,
                    related: e.related,
                })
                .collect();
            report_diagnostics(expr, &errors, opts);
            return Err("Evaluation failed due to errors above.".to_string());
        }
    };

    if opts.json {
        println!("{}", value.to_json());
    } else {
        println!("{}", value);
    }
    if value.is_error() {
        return Err("formula evaluated to an error".to_string());
    }
    Ok(())
}

/// Report diagnostics to stderr: one JSON object per line in JSON mode,
/// ariadne reports otherwise.
fn report_diagnostics(source: &str, errors: &[TypeError], opts: &DiagnosticOptions) {
    for error in errors {
        eprintln!("{}", render_diagnostic(error, source, FORMULA_FILE, opts));
    }
}
