//! `sam`: interactive command interpretation over a knowledge graph snapshot.
//!
//! ```text
//! sam --snapshot fixtures/subsea_world.json "open valve MECH-VALVE-TURN-UN-IN-11"
//! sam --snapshot fixtures/subsea_world.json          # read phrases from stdin
//! ```

use std::path::PathBuf;

use clap::Parser;
use sam_rs::operator::{ConsoleOperator, Operator, Prompt};
use sam_rs::{Error, Interpreter, InterpreterConfig, SituationReport, StoreConfig};
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "sam")]
#[command(version)]
#[command(about = "Situation awareness for subsea robot commands")]
struct Cli {
    /// Knowledge graph snapshot (JSON). Overrides the configured store.
    #[arg(short, long)]
    snapshot: Option<PathBuf>,

    /// Interpreter configuration (JSON).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print reports as JSON.
    #[arg(long)]
    json: bool,

    /// Command phrases. Without any, phrases are read interactively.
    phrases: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("sam: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> sam_rs::Result<()> {
    let mut config = match &cli.config {
        Some(path) => InterpreterConfig::from_json_file(path)?,
        None => InterpreterConfig::default(),
    };
    if let Some(path) = cli.snapshot.clone() {
        config.store = StoreConfig::Memory { snapshot: Some(path) };
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| Error::Config(format!("log level '{}': {e}", config.log_level)))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let sam = Interpreter::open(config)?;
    let mut operator = ConsoleOperator::stdio();

    if !cli.phrases.is_empty() {
        for phrase in &cli.phrases {
            let report = sam.interpret(phrase, &mut operator).await?;
            print_report(&report, cli.json)?;
        }
        return sam.shutdown().await;
    }

    loop {
        let phrase = match operator.prompt(&Prompt::NewPhrase) {
            Ok(p) => p,
            Err(Error::OperatorClosed) => break,
            Err(e) => return Err(e),
        };
        if phrase.is_empty() {
            continue;
        }
        match sam.interpret(&phrase, &mut operator).await {
            Ok(report) => print_report(&report, cli.json)?,
            Err(Error::OperatorClosed) => break,
            Err(e) => error!(error = %e, phrase = phrase.as_str(), "interpretation failed"),
        }
    }
    sam.shutdown().await
}

fn print_report(report: &SituationReport, json: bool) -> sam_rs::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}
