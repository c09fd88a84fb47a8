use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use clap::{Parser, Subcommand};
use sf_engine::{Clock, ClockEvent, ClockWorker, compile};
use sf_eval::ExprEvaluator;
use sf_input::OverrideStream;
use sf_project::SystemDoc;
use sf_results::CsvWriter;

#[derive(Parser)]
#[command(name = "sf-cli")]
#[command(about = "Stockflow CLI - stock-and-flow system dynamics simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a system document's syntax and structure
    Validate {
        /// Path to the system YAML (or JSON) file
        system_path: PathBuf,
    },
    /// Load a system and print its entities with their initial values
    Inspect {
        /// Path to the system YAML (or JSON) file
        system_path: PathBuf,
    },
    /// Run a simulation to completion
    Run {
        /// Path to the system YAML (or JSON) file
        system_path: PathBuf,
        /// Optional override document (.yaml/.json) or stream (.jsonl)
        #[arg(long)]
        overrides: Option<PathBuf>,
        /// Output CSV file path
        #[arg(short, long, default_value = "output.csv")]
        output: PathBuf,
        /// Print an event line for every completed step
        #[arg(long)]
        verbose: bool,
    },
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { system_path } => cmd_validate(&system_path),
        Commands::Inspect { system_path } => cmd_inspect(&system_path),
        Commands::Run {
            system_path,
            overrides,
            output,
            verbose,
        } => cmd_run(&system_path, overrides.as_deref(), &output, verbose),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("Error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn load_system(path: &Path) -> Result<SystemDoc, String> {
    let doc = if path.extension().is_some_and(|ext| ext == "json") {
        sf_project::load_system_json(path)
    } else {
        sf_project::load_system_yaml(path)
    };
    doc.map_err(|err| format!("{}: {err}", path.display()))
}

fn cmd_validate(system_path: &Path) -> Result<(), String> {
    let doc = load_system(system_path)?;
    let compiled = compile(&doc, &ExprEvaluator::new()).map_err(|err| err.to_string())?;
    println!(
        "OK: {} entities, {} steps declared",
        compiled.graph.len(),
        compiled.max_steps
    );
    Ok(())
}

fn cmd_inspect(system_path: &Path) -> Result<(), String> {
    let doc = load_system(system_path)?;
    let compiled = compile(&doc, &ExprEvaluator::new()).map_err(|err| err.to_string())?;

    println!("{} entities, {} steps declared", compiled.graph.len(), compiled.max_steps);
    for entity in compiled.graph.iter() {
        println!(
            "  {:<12} {:<20} current={}",
            entity.kind.tag(),
            entity.name,
            entity.current
        );
    }
    Ok(())
}

fn open_overrides(path: &Path) -> Result<OverrideStream, String> {
    let stream = if path.extension().is_some_and(|ext| ext == "jsonl") {
        let file = File::open(path).map_err(|err| format!("{}: {err}", path.display()))?;
        OverrideStream::from_jsonl(BufReader::new(file))
    } else if path.extension().is_some_and(|ext| ext == "json") {
        let doc = sf_project::load_overrides_json(path)
            .map_err(|err| format!("{}: {err}", path.display()))?;
        OverrideStream::from_doc(doc)
    } else {
        let doc = sf_project::load_overrides_yaml(path)
            .map_err(|err| format!("{}: {err}", path.display()))?;
        OverrideStream::from_doc(doc)
    };
    Ok(stream)
}

fn cmd_run(
    system_path: &Path,
    overrides: Option<&Path>,
    output: &Path,
    verbose: bool,
) -> Result<(), String> {
    let doc = load_system(system_path)?;
    let compiled = compile(&doc, &ExprEvaluator::new()).map_err(|err| err.to_string())?;
    let max_steps = compiled.max_steps;

    let out = File::create(output).map_err(|err| format!("{}: {err}", output.display()))?;
    let sink = CsvWriter::new(BufWriter::new(out));

    let clock = Clock::new(compiled, Box::new(ExprEvaluator::new()), Box::new(sink))
        .map_err(|err| err.to_string())?;
    if let Some(path) = overrides {
        clock.attach_overrides(open_overrides(path)?);
    }

    let events = clock.subscribe();
    let worker = ClockWorker::start(Arc::new(clock));

    // The clock outlives the run, so the channel never disconnects on its
    // own; drain until completion is announced or the worker exits.
    loop {
        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(ClockEvent::StepCompleted { step }) if verbose => {
                println!("step {}/{} complete", step + 1, max_steps);
            }
            Ok(ClockEvent::StepCompleted { .. }) => {}
            Ok(ClockEvent::RunCompleted { steps }) => {
                println!("run complete: {steps} steps -> {}", output.display());
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                if worker.is_finished() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    worker.join().map_err(|err| err.to_string())
}
