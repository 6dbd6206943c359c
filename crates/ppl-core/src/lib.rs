//! # PPL Core - Pipeline Language Foundations
//!
//! This crate provides the foundational types for the `.ppl` pipeline
//! language: the closed command model, the two-phase line parser, the
//! mutable execution context, lexical helpers, and the error taxonomy.
//!
//! ## Key Components
//!
//! - **Command Model**: one data-only [`Command`] variant per pipeline verb
//! - **Parser**: cleaned lines → ordered command list, with `try`/`on_error`
//!   block assembly and `Line N:` error messages
//! - **Context**: [`PipelineContext`] carrying the lazy working table,
//!   pending grouping, variables, timers, and the path sandbox
//! - **Errors**: the [`PplError`] taxonomy shared by parser and executor
//!
//! Execution lives in `ppl-tx`; file I/O lives in `ppl-io`. This crate
//! depends on DataFusion only for the Arrow/DataFrame types held by the
//! context.

pub mod command;
pub mod context;
pub mod error;
pub mod lex;
pub mod parser;
pub mod reader;

pub use command::{
    AggSpec, AggVerb, BoolOp, CmpOp, Command, Condition, DatePart, DiffUnit, FillStrategy,
    HandlerSpec, JoinHow, RhsValue, TimerAction, TruncUnit,
};
pub use context::{PipelineContext, TIMER_PREFIX};
pub use error::{PplError, Result};
pub use parser::parse_lines;
pub use reader::read_ppl_file;
