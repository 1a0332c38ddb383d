//! Settlement CLI entry point: config loading, store wiring, and reporting.

use std::process;

use clap::Parser;
use tracing::info;

use energy_settlement::cli::{Cli, Command, ConfigSource, RunArgs};
use energy_settlement::config::SettlementConfig;
use energy_settlement::error::Result;
use energy_settlement::io::export::{export_outputs, load_inputs, write_summary_json};
use energy_settlement::io::CsvDirStore;
use energy_settlement::pipeline::Pipeline;
use energy_settlement::telemetry::init_tracing;

fn run(args: &RunArgs) -> Result<()> {
    let config = args.source.load()?;
    let pipeline = Pipeline::new(config)?;

    let input = CsvDirStore::open(&args.input_dir)?;
    let inputs = load_inputs(&input)?;
    let output = pipeline.run(&inputs)?;

    let mut store = CsvDirStore::open(&args.output_dir)?;
    export_outputs(&mut store, &output)?;
    info!(dir = %store.dir().display(), "run complete");

    println!("{}", output.summary);
    if let Some(path) = &args.summary_json {
        write_summary_json(&output.summary, path)?;
        eprintln!("Summary written to {}", path.display());
    }
    Ok(())
}

fn check(source: &ConfigSource) -> Result<bool> {
    let config = source.load()?;
    let errors = config.validate();
    for e in &errors {
        eprintln!("{e}");
    }
    if errors.is_empty() {
        println!(
            "configuration ok: {} sites, {} priority entries",
            config.sites.len(),
            config.allocation.priority.len()
        );
    }
    Ok(errors.is_empty())
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let outcome = match &cli.command {
        Command::Run(args) => run(args).map(|()| true),
        Command::Check(source) => check(source),
        Command::Presets => {
            for name in SettlementConfig::PRESETS {
                println!("{name}");
            }
            Ok(true)
        }
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
