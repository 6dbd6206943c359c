//! Command model for the pipeline language.
//!
//! Every `.ppl` line parses into exactly one [`Command`] variant. Variants
//! are data-only; all execution logic lives in the `ppl-tx` executor so the
//! command list can be inspected, logged, or replayed without side effects.

use crate::error::{PplError, Result};

/// Comparison operators accepted in `filter` / `assert` / `count if`
/// conditions, tried longest-first when splitting a condition string.
pub const OPERATORS: [&str; 6] = [">=", "<=", "!=", "==", ">", "<"];

/// A comparison operator in a column condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl CmpOp {
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            ">" => Some(CmpOp::Gt),
            "<" => Some(CmpOp::Lt),
            ">=" => Some(CmpOp::Ge),
            "<=" => Some(CmpOp::Le),
            "==" => Some(CmpOp::Eq),
            "!=" => Some(CmpOp::Ne),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Gt => ">",
            CmpOp::Lt => "<",
            CmpOp::Ge => ">=",
            CmpOp::Le => "<=",
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
        }
    }
}

impl std::fmt::Display for CmpOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean combinator between adjacent conditions of a compound filter.
/// Evaluated left-to-right with no precedence difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

/// Right-hand side of a condition: numeric when it parses as `f64`
/// (after outer quotes are stripped), a string otherwise.
///
/// A string beginning with `$` is a variable reference resolved at
/// execute time and re-coerced after substitution.
#[derive(Debug, Clone, PartialEq)]
pub enum RhsValue {
    Number(f64),
    Str(String),
}

impl RhsValue {
    /// Strip outer quotes and attempt numeric coercion.
    pub fn coerce(raw: &str) -> Self {
        let stripped = crate::lex::strip_quotes(raw);
        match stripped.parse::<f64>() {
            Ok(n) => RhsValue::Number(n),
            Err(_) => RhsValue::Str(stripped),
        }
    }
}

impl std::fmt::Display for RhsValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RhsValue::Number(n) => write!(f, "{n}"),
            RhsValue::Str(s) => f.write_str(s),
        }
    }
}

/// One condition of a (compound) filter: `(column, operator, rhs)`.
pub type Condition = (String, CmpOp, RhsValue);

/// Join strategies for `join … on KEY [how]`; defaults to `inner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinHow {
    Inner,
    Left,
    Right,
    Outer,
}

impl JoinHow {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inner" => Some(JoinHow::Inner),
            "left" => Some(JoinHow::Left),
            "right" => Some(JoinHow::Right),
            "outer" => Some(JoinHow::Outer),
            _ => None,
        }
    }
}

/// Aggregation verb inside an `agg` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggVerb {
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

impl AggVerb {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sum" => Some(AggVerb::Sum),
            "avg" => Some(AggVerb::Avg),
            "min" => Some(AggVerb::Min),
            "max" => Some(AggVerb::Max),
            "count" => Some(AggVerb::Count),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggVerb::Sum => "sum",
            AggVerb::Avg => "avg",
            AggVerb::Min => "min",
            AggVerb::Max => "max",
            AggVerb::Count => "count",
        }
    }
}

/// One spec of a multi-aggregation: `col` is `None` only for `count`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggSpec {
    pub verb: AggVerb,
    pub col: Option<String>,
}

/// Missing-value strategy for `fill`; anything outside the named
/// strategies is treated as a literal fill value.
#[derive(Debug, Clone, PartialEq)]
pub enum FillStrategy {
    Mean,
    Median,
    Mode,
    Forward,
    Backward,
    Drop,
    Literal(String),
}

impl FillStrategy {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "mean" => FillStrategy::Mean,
            "median" => FillStrategy::Median,
            "mode" => FillStrategy::Mode,
            "forward" => FillStrategy::Forward,
            "backward" => FillStrategy::Backward,
            "drop" => FillStrategy::Drop,
            other => FillStrategy::Literal(crate::lex::strip_quotes(other)),
        }
    }
}

/// Timer sub-command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    Start,
    Stop,
    Lap,
}

/// Datetime component for `extract`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Weekday,
    Quarter,
}

impl DatePart {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "year" => Some(DatePart::Year),
            "month" => Some(DatePart::Month),
            "day" => Some(DatePart::Day),
            "hour" => Some(DatePart::Hour),
            "minute" => Some(DatePart::Minute),
            "second" => Some(DatePart::Second),
            "weekday" => Some(DatePart::Weekday),
            "quarter" => Some(DatePart::Quarter),
            _ => None,
        }
    }
}

/// Unit for `date_diff` results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffUnit {
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl DiffUnit {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "days" => Some(DiffUnit::Days),
            "hours" => Some(DiffUnit::Hours),
            "minutes" => Some(DiffUnit::Minutes),
            "seconds" => Some(DiffUnit::Seconds),
            _ => None,
        }
    }

    /// Length of the unit in seconds.
    pub fn seconds(&self) -> f64 {
        match self {
            DiffUnit::Days => 86_400.0,
            DiffUnit::Hours => 3_600.0,
            DiffUnit::Minutes => 60.0,
            DiffUnit::Seconds => 1.0,
        }
    }
}

/// Truncation unit for `truncate_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncUnit {
    Year,
    Month,
    Week,
    Day,
    Hour,
}

impl TruncUnit {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "year" => Some(TruncUnit::Year),
            "month" => Some(TruncUnit::Month),
            "week" => Some(TruncUnit::Week),
            "day" => Some(TruncUnit::Day),
            "hour" => Some(TruncUnit::Hour),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TruncUnit::Year => "year",
            TruncUnit::Month => "month",
            TruncUnit::Week => "week",
            TruncUnit::Day => "day",
            TruncUnit::Hour => "hour",
        }
    }
}

/// Handler attached to a `try` block by its `on_error` line.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerSpec {
    /// Swallow the error and continue with the next command.
    Skip,
    /// Print `[TRY] <msg>: <err>` and continue.
    Log(String),
    /// Execute recovery commands against the current (possibly
    /// partially-mutated) context.
    Run(Vec<Command>),
}

/// One pipeline instruction.
///
/// The set is closed: the parser maps every supported keyword to exactly
/// one variant, and the executor matches exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Loading
    Source { path: String, chunk_size: Option<usize> },
    Foreach { pattern: String },
    Include { path: String },

    // Filtering
    Filter { col: String, op: CmpOp, rhs: RhsValue },
    CompoundFilter { conds: Vec<Condition>, logic: Vec<BoolOp> },

    // Projection
    Select { cols: Vec<String> },
    Drop { cols: Vec<String> },
    Limit { n: usize },
    Distinct,
    Sample { n: Option<usize>, pct: Option<f64> },

    // Transform
    Sort { cols: Vec<String>, ascending: Vec<bool> },
    Rename { old: String, new: String },
    Add { col: String, expr: String },
    AddIf {
        col: String,
        cond_col: String,
        cond_op: CmpOp,
        cond_rhs: RhsValue,
        true_val: String,
        false_val: String,
    },
    Trim { col: String },
    Uppercase { col: String },
    Lowercase { col: String },
    Cast { col: String, type_name: String },
    Replace { col: String, old: String, new: String },
    Pivot { index: String, column: String, value: String },

    // Grouping & aggregation
    GroupBy { cols: Vec<String> },
    Count,
    CountIf { col: String, op: CmpOp, rhs: RhsValue },
    Sum { col: String },
    Avg { col: String },
    Min { col: String },
    Max { col: String },
    MultiAgg { specs: Vec<AggSpec> },

    // Multi-source
    Join { path: String, key: String, how: JoinHow },
    Merge { path: String },

    // Output
    Save { path: String },
    Print,
    Schema,
    Inspect,
    Head { n: usize },
    Log { message: String },
    Timer { action: TimerAction, label: String },

    // Quality
    Assert { col: String, op: CmpOp, rhs: RhsValue },
    Fill { col: String, strategy: FillStrategy },

    // Variables
    Set { name: String, value: String },
    Env { var_name: String },

    // Error recovery
    Try { body: Vec<Command>, on_error: HandlerSpec },

    // Datetime
    ParseDate { col: String, format: String },
    Extract { part: DatePart, col: String, new_col: String },
    DateDiff { col1: String, col2: String, new_col: String, unit: DiffUnit },
    FilterDate { col: String, op: CmpOp, iso_date: String },
    TruncateDate { col: String, unit: TruncUnit },
    TsSort { col: String },
}

impl Command {
    /// Variant name used when wrapping execution errors (`[Filter] …`).
    pub fn name(&self) -> &'static str {
        match self {
            Command::Source { .. } => "Source",
            Command::Foreach { .. } => "Foreach",
            Command::Include { .. } => "Include",
            Command::Filter { .. } => "Filter",
            Command::CompoundFilter { .. } => "CompoundFilter",
            Command::Select { .. } => "Select",
            Command::Drop { .. } => "Drop",
            Command::Limit { .. } => "Limit",
            Command::Distinct => "Distinct",
            Command::Sample { .. } => "Sample",
            Command::Sort { .. } => "Sort",
            Command::Rename { .. } => "Rename",
            Command::Add { .. } => "Add",
            Command::AddIf { .. } => "AddIf",
            Command::Trim { .. } => "Trim",
            Command::Uppercase { .. } => "Uppercase",
            Command::Lowercase { .. } => "Lowercase",
            Command::Cast { .. } => "Cast",
            Command::Replace { .. } => "Replace",
            Command::Pivot { .. } => "Pivot",
            Command::GroupBy { .. } => "GroupBy",
            Command::Count => "Count",
            Command::CountIf { .. } => "CountIf",
            Command::Sum { .. } => "Sum",
            Command::Avg { .. } => "Avg",
            Command::Min { .. } => "Min",
            Command::Max { .. } => "Max",
            Command::MultiAgg { .. } => "MultiAgg",
            Command::Join { .. } => "Join",
            Command::Merge { .. } => "Merge",
            Command::Save { .. } => "Save",
            Command::Print => "Print",
            Command::Schema => "Schema",
            Command::Inspect => "Inspect",
            Command::Head { .. } => "Head",
            Command::Log { .. } => "Log",
            Command::Timer { .. } => "Timer",
            Command::Assert { .. } => "Assert",
            Command::Fill { .. } => "Fill",
            Command::Set { .. } => "Set",
            Command::Env { .. } => "Env",
            Command::Try { .. } => "Try",
            Command::ParseDate { .. } => "ParseDate",
            Command::Extract { .. } => "Extract",
            Command::DateDiff { .. } => "DateDiff",
            Command::FilterDate { .. } => "FilterDate",
            Command::TruncateDate { .. } => "TruncateDate",
            Command::TsSort { .. } => "TsSort",
        }
    }
}

/// Split a raw condition string (`age >= 18`) into `(column, op, rhs)`,
/// trying two-character operators before one-character ones.
pub fn split_condition(raw: &str, line: usize, verb: &str) -> Result<Condition> {
    let raw = raw.trim();
    for op_str in OPERATORS {
        if let Some(idx) = raw.find(op_str) {
            let column = raw[..idx].trim();
            let value = raw[idx + op_str.len()..].trim();
            if column.is_empty() || value.is_empty() {
                break;
            }
            // OPERATORS is ordered longest-first, so `parse` cannot fail here
            let op = CmpOp::parse(op_str).ok_or_else(|| PplError::Syntax {
                line,
                message: format!("unsupported operator '{op_str}'"),
            })?;
            return Ok((column.to_string(), op, RhsValue::coerce(value)));
        }
    }
    Err(PplError::Syntax {
        line,
        message: format!(
            "could not parse '{verb}' condition '{raw}'. \
             Expected: {verb} <column> <op> <value>  (e.g. {verb} age > 18)"
        ),
    })
}
