//! # PPL IO - Tabular File I/O
//!
//! Loaders and writers for the file formats the pipeline language speaks:
//! CSV (the default), newline-delimited JSON, and Parquet. Loading goes
//! through DataFusion's listing readers so the working table stays lazy;
//! writing goes directly through the Arrow CSV / JSON writers and the
//! Parquet `ArrowWriter`.

pub mod reader;
pub mod writer;

pub use reader::{glob_paths, load};
pub use writer::TableWriter;

/// File format, detected from the lowercased path extension.
///
/// Anything that is not `.parquet` / `.json` / `.ndjson` is read as CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    NdJson,
    Parquet,
}

impl FileFormat {
    pub fn detect(path: &str) -> Self {
        match extension(path).to_lowercase().as_str() {
            "parquet" => FileFormat::Parquet,
            "json" | "ndjson" => FileFormat::NdJson,
            _ => FileFormat::Csv,
        }
    }
}

/// Extension of `path` without the leading dot; empty when absent.
pub(crate) fn extension(path: &str) -> &str {
    std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_parquet() {
        assert_eq!(FileFormat::detect("data/snapshot.parquet"), FileFormat::Parquet);
        assert_eq!(FileFormat::detect("DATA.PARQUET"), FileFormat::Parquet);
    }

    #[test]
    fn detects_ndjson() {
        assert_eq!(FileFormat::detect("events.json"), FileFormat::NdJson);
        assert_eq!(FileFormat::detect("events.ndjson"), FileFormat::NdJson);
    }

    #[test]
    fn defaults_to_csv() {
        assert_eq!(FileFormat::detect("people.csv"), FileFormat::Csv);
        assert_eq!(FileFormat::detect("people.txt"), FileFormat::Csv);
        assert_eq!(FileFormat::detect("no_extension"), FileFormat::Csv);
    }
}
