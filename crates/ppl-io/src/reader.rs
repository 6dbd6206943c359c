//! Lazy table loaders.

use std::path::Path;

use datafusion::prelude::{
    CsvReadOptions, DataFrame, NdJsonReadOptions, ParquetReadOptions, SessionContext,
};
use tracing::info;

use ppl_core::error::{PplError, Result};

use crate::{extension, FileFormat};

/// Load `path` into a lazy [`DataFrame`], dispatching on the detected
/// file format.
///
/// The actual file extension is passed through to the listing reader so
/// unconventional suffixes (e.g. `.txt` read as CSV) still resolve.
pub async fn load(session: &SessionContext, path: &str) -> Result<DataFrame> {
    if !Path::new(path).exists() {
        return Err(PplError::NotFound(format!(
            "Source file not found: '{path}'"
        )));
    }

    let format = FileFormat::detect(path);
    let ext = match extension(path) {
        "" => String::new(),
        e => format!(".{e}"),
    };
    info!(path, ?format, "loading table");

    let frame = match format {
        FileFormat::Csv => {
            let options = CsvReadOptions::new().file_extension(&ext);
            session.read_csv(path, options).await?
        }
        FileFormat::NdJson => {
            let mut options = NdJsonReadOptions::default();
            options.file_extension = &ext;
            session.read_json(path, options).await?
        }
        FileFormat::Parquet => {
            let mut options = ParquetReadOptions::default();
            options.file_extension = &ext;
            session.read_parquet(path, options).await?
        }
    };
    Ok(frame)
}

/// Resolve a glob pattern to matching paths, in glob order.
///
/// An invalid pattern is a value error; zero matches is a not-found
/// error, mirroring a missing source file.
pub fn glob_paths(pattern: &str) -> Result<Vec<String>> {
    let entries = glob::glob(pattern)
        .map_err(|e| PplError::Value(format!("invalid glob pattern '{pattern}': {e}")))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path =
            entry.map_err(|e| PplError::Runtime(format!("glob '{pattern}' failed: {e}")))?;
        paths.push(path.display().to_string());
    }
    if paths.is_empty() {
        return Err(PplError::NotFound(format!("no files matched: {pattern}")));
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn loads_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "name,age").unwrap();
        writeln!(f, "Alice,30").unwrap();

        let session = SessionContext::new();
        let frame = load(&session, path.to_str().unwrap()).await.unwrap();
        let batches = frame.collect().await.unwrap();
        assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 1);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let session = SessionContext::new();
        let err = load(&session, "nope.csv").await.unwrap_err();
        assert!(matches!(err, PplError::NotFound(_)));
    }

    #[test]
    fn glob_with_no_matches_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*.csv", dir.path().display());
        let err = glob_paths(&pattern).unwrap_err();
        assert!(matches!(err, PplError::NotFound(_)));
    }

    #[test]
    fn glob_finds_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.csv", "a.csv"] {
            std::fs::write(dir.path().join(name), "x\n1\n").unwrap();
        }
        let pattern = format!("{}/*.csv", dir.path().display());
        let paths = glob_paths(&pattern).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("a.csv"));
    }
}
