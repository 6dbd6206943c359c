//! Mutable execution context shared by all commands during a pipeline run.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use datafusion::prelude::{DataFrame, SessionConfig, SessionContext};

use crate::error::{PplError, Result};

/// Reserved prefix under which timer entries live.
pub const TIMER_PREFIX: &str = "__timer_";

/// Execution state threaded through every command of a pipeline run.
///
/// The working table is a lazy DataFusion [`DataFrame`]: transformations
/// stack up as a logical plan and nothing is materialised until an output
/// command (or the end of the pipeline) collects it. In streaming mode the
/// final collection drains the plan batch by batch instead.
pub struct PipelineContext {
    /// Engine session owning the working table's plans.
    pub session: SessionContext,
    /// The current working table; `None` until a loading command runs.
    pub table: Option<DataFrame>,
    /// Columns set by `group by`, consumed by the next aggregation.
    pub group_by: Option<Vec<String>>,
    /// Variables set via `set` / `env`, referenced as `$name`.
    pub variables: HashMap<String, String>,
    /// Running timers keyed `__timer_<label>`.
    pub timers: HashMap<String, Instant>,
    /// When set, all file I/O must stay inside this directory tree.
    pub sandbox_dir: Option<PathBuf>,
    /// When true, the final collection uses the engine's batch stream.
    pub streaming: bool,
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineContext {
    pub fn new() -> Self {
        Self {
            session: SessionContext::new(),
            table: None,
            group_by: None,
            variables: HashMap::new(),
            timers: HashMap::new(),
            sandbox_dir: None,
            streaming: false,
        }
    }

    /// Switch to streaming mode with the given engine batch size.
    ///
    /// Rebuilds the session so every subsequent scan produces batches of
    /// at most `chunk_size` rows. Must run before the table is loaded,
    /// which `source … chunk N` guarantees.
    pub fn enable_streaming(&mut self, chunk_size: usize) {
        let config = SessionConfig::new().with_batch_size(chunk_size);
        self.session = SessionContext::new_with_config(config);
        self.streaming = true;
    }

    /// Borrow the working table, failing with the standard "no data
    /// loaded" runtime error when no source has run yet.
    pub fn table(&self, verb: &str) -> Result<&DataFrame> {
        self.table
            .as_ref()
            .ok_or_else(|| PplError::Runtime(format!("{verb}: no data loaded — use 'source' first")))
    }

    /// Take ownership of the working table for a rebinding operation.
    pub fn take_table(&mut self, verb: &str) -> Result<DataFrame> {
        self.table
            .take()
            .ok_or_else(|| PplError::Runtime(format!("{verb}: no data loaded — use 'source' first")))
    }

    /// Rebind the working table and clear any pending grouping.
    ///
    /// Every non-aggregation command that replaces the table goes through
    /// here so a stale `group by` can never leak past it.
    pub fn rebind(&mut self, table: DataFrame) {
        self.table = Some(table);
        self.group_by = None;
    }

    /// Look up a variable, failing with a key error on unknown names.
    pub fn variable(&self, name: &str) -> Result<&str> {
        self.variables
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| PplError::Key(format!("undefined variable '${name}'")))
    }
}
