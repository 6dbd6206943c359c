//! Shared fixtures for the pipeline integration tests.

use std::path::Path;

use datafusion::arrow::array::{Array, RecordBatch};
use datafusion::arrow::util::display::array_value_to_string;

use ppl_core::error::Result;
use ppl_core::parse_lines;
use ppl_tx::run_pipeline;

/// The reference dataset used across the suite.
pub const PEOPLE_CSV: &str = "\
name,age,country,salary
Alice,30,Germany,72000
Bob,17,France,0
Charlie,25,Germany,55000
Diana,42,USA,98000
Eve,16,France,0
";

pub const LOOKUP_CSV: &str = "\
name,dept
Alice,Engineering
Charlie,Engineering
Diana,HR
";

pub fn write_file(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write fixture");
    path.to_string_lossy().into_owned()
}

pub fn people_csv(dir: &Path) -> String {
    write_file(dir, "people.csv", PEOPLE_CSV)
}

pub fn lookup_csv(dir: &Path) -> String {
    write_file(dir, "lookup.csv", LOOKUP_CSV)
}

/// Parse and execute a pipeline given as individual lines.
pub async fn run(lines: &[String]) -> Result<Option<Vec<RecordBatch>>> {
    run_pipeline(&parse_lines(lines)?).await
}

pub async fn run_str(lines: &[&str]) -> Result<Option<Vec<RecordBatch>>> {
    let owned: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    run(&owned).await
}

pub fn row_count(batches: &[RecordBatch]) -> usize {
    batches.iter().map(|b| b.num_rows()).sum()
}

pub fn column_names(batches: &[RecordBatch]) -> Vec<String> {
    batches
        .first()
        .map(|b| {
            b.schema()
                .fields()
                .iter()
                .map(|f| f.name().clone())
                .collect()
        })
        .unwrap_or_default()
}

/// All values of one column, rendered as strings; `None` marks nulls.
pub fn column(batches: &[RecordBatch], name: &str) -> Vec<Option<String>> {
    let mut values = Vec::new();
    for batch in batches {
        let idx = batch.schema().index_of(name).expect("column exists");
        let array = batch.column(idx);
        for row in 0..array.len() {
            if array.is_null(row) {
                values.push(None);
            } else {
                values.push(Some(
                    array_value_to_string(array, row).expect("render value"),
                ));
            }
        }
    }
    values
}

/// Column values parsed as f64, nulls skipped.
pub fn numeric_column(batches: &[RecordBatch], name: &str) -> Vec<f64> {
    column(batches, name)
        .into_iter()
        .flatten()
        .map(|v| v.parse::<f64>().expect("numeric value"))
        .collect()
}
