//! # PPL CLI - Pipeline Runner
//!
//! Runs a `.ppl` pipeline file end to end:
//!
//! 1. Read and clean the file (comment stripping, blank-line removal).
//! 2. Parse the lines into the command list.
//! 3. Execute the commands against a fresh pipeline context.
//! 4. Print a success summary and a preview of the output.
//!
//! The working directory is switched to the pipeline file's directory
//! before execution, so relative paths inside the pipeline (e.g.
//! `source "data/people.csv"`) resolve predictably no matter where the
//! command was invoked from.
//!
//! ## Usage
//!
//! ```bash
//! # Run a pipeline
//! ppl pipelines/example.ppl
//!
//! # Enable debug logging
//! RUST_LOG=debug ppl pipelines/example.ppl
//! ```
//!
//! Exit code is 0 on success and 1 on any read, parse, or execution
//! error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use datafusion::arrow::array::RecordBatch;
use datafusion::arrow::util::pretty::pretty_format_batches;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ppl_core::{parse_lines, read_ppl_file};
use ppl_tx::run_pipeline;

/// Command-line arguments for the pipeline runner
#[derive(Parser, Debug)]
#[command(name = "ppl")]
#[command(about = "Run a .ppl data-pipeline file")]
#[command(long_about = "
ppl executes data pipelines written in the .ppl line-oriented pipeline
language: load CSV / NDJSON / Parquet data, chain relational, string,
datetime, and quality operators, and write or print the result.

Examples:
  ppl pipelines/example.ppl
  RUST_LOG=debug ppl pipelines/report.ppl
")]
struct Args {
    /// Path to the pipeline file (must end in .ppl)
    #[arg(help = "Pipeline file (.ppl)")]
    pipeline: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    run(&args.pipeline).await
}

async fn run(pipeline: &PathBuf) -> ExitCode {
    let path = pipeline.to_string_lossy().into_owned();

    // Step 1 - read the .ppl file
    let lines = match read_ppl_file(&path) {
        Ok(lines) => lines,
        Err(err) => {
            eprintln!("Error reading pipeline file: {err}");
            return ExitCode::FAILURE;
        }
    };
    if lines.is_empty() {
        println!("Warning: '{path}' contains no executable commands.");
        return ExitCode::SUCCESS;
    }

    // Relative paths inside the pipeline resolve against its own directory.
    if let Ok(absolute) = std::fs::canonicalize(pipeline) {
        if let Some(dir) = absolute.parent() {
            if let Err(err) = std::env::set_current_dir(dir) {
                eprintln!("Error entering pipeline directory: {err}");
                return ExitCode::FAILURE;
            }
        }
    }

    println!("Loaded {} command(s) from '{path}'.", lines.len());

    // Step 2 - parse lines into commands
    let commands = match parse_lines(&lines) {
        Ok(commands) => commands,
        Err(err) => {
            eprintln!("Parse error: {err}");
            return ExitCode::FAILURE;
        }
    };
    println!("Parsed {} command(s).", commands.len());

    // Step 3 - execute the pipeline
    let result = match run_pipeline(&commands).await {
        Ok(result) => result,
        Err(err) => {
            eprintln!("Execution error: {err}");
            return ExitCode::FAILURE;
        }
    };

    // Step 4 - report results
    println!();
    println!("Pipeline completed successfully.");
    report(result);
    ExitCode::SUCCESS
}

fn report(result: Option<Vec<RecordBatch>>) {
    let Some(batches) = result else {
        println!("Pipeline produced no output.");
        return;
    };
    let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    if rows == 0 {
        println!("Output is an empty table (all rows were filtered out).");
        return;
    }
    let cols = batches.first().map(|b| b.num_columns()).unwrap_or(0);
    println!("Output: {rows} row(s) × {cols} column(s).");
    println!();
    println!("Preview (first 10 rows):");
    match pretty_format_batches(&preview(&batches, 10)) {
        Ok(table) => println!("{table}"),
        Err(err) => println!("(preview unavailable: {err})"),
    }
}

/// First `limit` rows across the collected batches.
fn preview(batches: &[RecordBatch], limit: usize) -> Vec<RecordBatch> {
    let mut remaining = limit;
    let mut out = Vec::new();
    for batch in batches {
        if remaining == 0 {
            break;
        }
        let take = batch.num_rows().min(remaining);
        if take > 0 {
            out.push(batch.slice(0, take));
            remaining -= take;
        }
    }
    out
}
