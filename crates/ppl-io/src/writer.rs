//! Batch writers for `save`.

use std::fs::File;
use std::path::Path;

use datafusion::arrow::array::RecordBatch;
use datafusion::arrow::csv;
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::arrow::json::LineDelimitedWriter;
use datafusion::parquet::arrow::arrow_writer::ArrowWriter;
use datafusion::parquet::file::properties::WriterProperties;
use tracing::info;

use ppl_core::error::{PplError, Result};

use crate::FileFormat;

/// Incremental writer over the output formats `save` supports.
///
/// Batches are appended one at a time, so a streaming pipeline can drain
/// its batch stream straight into the file without materialising the
/// whole table first.
pub enum TableWriter {
    Csv(csv::Writer<File>),
    NdJson(LineDelimitedWriter<File>),
    Parquet(ArrowWriter<File>),
}

impl TableWriter {
    /// Open a writer for `path`, creating parent directories as needed.
    pub fn create(path: &str, schema: SchemaRef) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    PplError::Runtime(format!("could not create directory for '{path}': {e}"))
                })?;
            }
        }
        let file = File::create(path)
            .map_err(|e| PplError::Runtime(format!("could not create '{path}': {e}")))?;

        let format = FileFormat::detect(path);
        info!(path, ?format, "writing table");
        Ok(match format {
            FileFormat::Csv => {
                TableWriter::Csv(csv::WriterBuilder::new().with_header(true).build(file))
            }
            FileFormat::NdJson => TableWriter::NdJson(LineDelimitedWriter::new(file)),
            FileFormat::Parquet => {
                let props = WriterProperties::builder().build();
                let writer = ArrowWriter::try_new(file, schema, Some(props))
                    .map_err(|e| PplError::Runtime(format!("parquet writer: {e}")))?;
                TableWriter::Parquet(writer)
            }
        })
    }

    pub fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        match self {
            TableWriter::Csv(w) => w.write(batch)?,
            TableWriter::NdJson(w) => w.write(batch)?,
            TableWriter::Parquet(w) => w
                .write(batch)
                .map_err(|e| PplError::Runtime(format!("parquet write: {e}")))?,
        }
        Ok(())
    }

    /// Flush footers and close the file.
    pub fn finish(self) -> Result<()> {
        match self {
            TableWriter::Csv(_) => {}
            TableWriter::NdJson(mut w) => w.finish()?,
            TableWriter::Parquet(w) => {
                w.close()
                    .map_err(|e| PplError::Runtime(format!("parquet close: {e}")))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use datafusion::arrow::array::{Int64Array, StringArray};
    use datafusion::arrow::datatypes::{DataType, Field, Schema};

    use super::*;

    fn sample_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("name", DataType::Utf8, true),
            Field::new("age", DataType::Int64, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["Alice", "Bob"])),
                Arc::new(Int64Array::from(vec![30, 17])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn writes_csv_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let batch = sample_batch();
        let mut writer =
            TableWriter::create(path.to_str().unwrap(), batch.schema()).unwrap();
        writer.write(&batch).unwrap();
        writer.finish().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("name,age"));
        assert!(content.contains("Alice,30"));
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("out.json");
        let batch = sample_batch();
        let mut writer =
            TableWriter::create(path.to_str().unwrap(), batch.schema()).unwrap();
        writer.write(&batch).unwrap();
        writer.finish().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn writes_parquet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        let batch = sample_batch();
        let mut writer =
            TableWriter::create(path.to_str().unwrap(), batch.schema()).unwrap();
        writer.write(&batch).unwrap();
        writer.finish().unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
}
