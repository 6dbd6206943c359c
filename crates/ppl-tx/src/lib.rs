//! # PPL TX - Execution Engine
//!
//! Drives a parsed command list against a [`PipelineContext`]: every
//! command either rewrites the lazy working table, consumes the pending
//! grouping into an aggregation, touches the variable environment, or
//! produces stdout output. The table stays a DataFusion logical plan
//! until an output command (or the end of the pipeline) materialises it;
//! in streaming mode the final materialisation drains the engine's batch
//! stream instead of collecting in one piece.
//!
//! ## Failure semantics
//!
//! Command errors keep their [`PplError`] kind and gain a
//! `[VariantName]` prefix, except inside `try` bodies where the raw
//! error is handed to the block's `on_error` handler.

pub mod datetime;
pub mod expr;
pub mod ops;

use std::path::PathBuf;
use std::time::Instant;

use datafusion::arrow::array::RecordBatch;
use datafusion::arrow::util::pretty::pretty_format_batches;
use datafusion::functions::expr_fn::{btrim, lower, upper};
use datafusion::functions_aggregate::expr_fn::{avg, count, max, min, sum};
use datafusion::prelude::{ident, lit, when, DataFrame, Expr};
use futures::future::BoxFuture;
use futures::StreamExt;
use tracing::debug;

use ppl_core::command::{
    AggSpec, AggVerb, BoolOp, Command, Condition, HandlerSpec, RhsValue, TimerAction,
};
use ppl_core::context::{PipelineContext, TIMER_PREFIX};
use ppl_core::error::{PplError, Result};
use ppl_core::lex;
use ppl_core::{parse_lines, read_ppl_file};

use crate::ops::{compare, has_column, require_columns, rhs_to_expr, try_cast_expr};

/// Single-threaded interpreter for a parsed pipeline.
pub struct Executor {
    ctx: PipelineContext,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Self {
            ctx: PipelineContext::new(),
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut PipelineContext {
        &mut self.ctx
    }

    /// Run the full command list, wrapping failures with the failing
    /// command's variant name.
    pub async fn run(&mut self, commands: &[Command]) -> Result<()> {
        self.run_seq(commands, true).await
    }

    async fn run_seq(&mut self, commands: &[Command], wrap: bool) -> Result<()> {
        for command in commands {
            let result = self.execute(command).await;
            match result {
                Ok(()) => {}
                Err(err) if wrap => {
                    return Err(err.map_message(|m| format!("[{}] {m}", command.name())));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Materialise the final table, honouring streaming mode.
    pub async fn finish(self) -> Result<Option<Vec<RecordBatch>>> {
        let Some(frame) = self.ctx.table else {
            return Ok(None);
        };
        if self.ctx.streaming {
            let mut stream = frame.execute_stream().await?;
            let mut batches = Vec::new();
            while let Some(batch) = stream.next().await {
                batches.push(batch?);
            }
            Ok(Some(batches))
        } else {
            Ok(Some(frame.collect().await?))
        }
    }

    // Boxed so `try` bodies and `include` can recurse through it.
    fn execute<'a>(&'a mut self, command: &'a Command) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match command {
                // ---------------------------------------------------- loading
                Command::Source { path, chunk_size } => {
                    let path = lex::substitute_variables(path, &self.ctx.variables)?;
                    lex::check_path_sandbox(&path, self.ctx.sandbox_dir.as_deref())?;
                    if let Some(n) = chunk_size {
                        self.ctx.enable_streaming(*n);
                    }
                    let frame = ppl_io::load(&self.ctx.session, &path).await?;
                    self.ctx.rebind(frame);
                }
                Command::Foreach { pattern } => {
                    let pattern = lex::substitute_variables(pattern, &self.ctx.variables)?;
                    let paths = ppl_io::glob_paths(&pattern)?;
                    let mut combined: Option<DataFrame> = None;
                    for path in &paths {
                        lex::check_path_sandbox(path, self.ctx.sandbox_dir.as_deref())?;
                        let frame = ppl_io::load(&self.ctx.session, path).await?;
                        combined = Some(match combined {
                            None => frame,
                            Some(acc) => ops::concat_diagonal(acc, frame)?,
                        });
                    }
                    if let Some(frame) = combined {
                        self.ctx.rebind(frame);
                    }
                }
                Command::Include { path } => {
                    let path = lex::substitute_variables(path, &self.ctx.variables)?;
                    lex::check_path_sandbox(&path, self.ctx.sandbox_dir.as_deref())?;
                    let wrap_path = |m: String| format!("'{path}': {m}");
                    let lines = read_ppl_file(&path).map_err(|e| e.map_message(wrap_path))?;
                    let commands = parse_lines(&lines).map_err(|e| e.map_message(wrap_path))?;
                    if let Err(err) = self.run_seq(&commands, true).await {
                        return Err(err.map_message(wrap_path));
                    }
                }

                // -------------------------------------------------- filtering
                Command::Filter { col, op, rhs } => {
                    let frame = self.ctx.take_table("filter")?;
                    require_columns(&frame, &[col], "filter")?;
                    let rhs = self.resolve_rhs(rhs)?;
                    self.ctx.rebind(frame.filter(compare(col, *op, &rhs))?);
                }
                Command::CompoundFilter { conds, logic } => {
                    let frame = self.ctx.take_table("filter")?;
                    let predicate = self.compound_predicate(&frame, conds, logic)?;
                    self.ctx.rebind(frame.filter(predicate)?);
                }

                // ------------------------------------------------- projection
                Command::Select { cols } => {
                    let frame = self.ctx.take_table("select")?;
                    let names: Vec<&str> = cols.iter().map(String::as_str).collect();
                    require_columns(&frame, &names, "select")?;
                    self.ctx.rebind(frame.select_columns(&names)?);
                }
                Command::Drop { cols } => {
                    let frame = self.ctx.take_table("drop")?;
                    let names: Vec<&str> = cols.iter().map(String::as_str).collect();
                    require_columns(&frame, &names, "drop")?;
                    self.ctx.rebind(frame.drop_columns(&names)?);
                }
                Command::Limit { n } => {
                    let frame = self.ctx.take_table("limit")?;
                    self.ctx.rebind(frame.limit(0, Some(*n))?);
                }
                Command::Distinct => {
                    let frame = self.ctx.take_table("distinct")?;
                    self.ctx.rebind(frame.distinct()?);
                }
                Command::Sample { n, pct } => {
                    let frame = self.ctx.take_table("sample")?;
                    let sampled = ops::sample(&self.ctx.session, frame, *n, *pct).await?;
                    self.ctx.rebind(sampled);
                }

                // -------------------------------------------------- transform
                Command::Sort { cols, ascending } => {
                    let frame = self.ctx.take_table("sort")?;
                    let names: Vec<&str> = cols.iter().map(String::as_str).collect();
                    require_columns(&frame, &names, "sort")?;
                    let keys = cols
                        .iter()
                        .zip(ascending)
                        .map(|(col, asc)| ident(col).sort(*asc, false))
                        .collect();
                    self.ctx.rebind(frame.sort(keys)?);
                }
                Command::Rename { old, new } => {
                    let frame = self.ctx.take_table("rename")?;
                    require_columns(&frame, &[old], "rename")?;
                    self.ctx.rebind(frame.with_column_renamed(old, new)?);
                }
                Command::Add { col, expr } => {
                    let frame = self.ctx.take_table("add")?;
                    let expr = lex::substitute_variables(expr, &self.ctx.variables)?;
                    let (parsed, referenced) = expr::parse_arithmetic(&expr)?;
                    let names: Vec<&str> = referenced.iter().map(String::as_str).collect();
                    require_columns(&frame, &names, "add")?;
                    self.ctx.rebind(frame.with_column(col, parsed)?);
                }
                Command::AddIf {
                    col,
                    cond_col,
                    cond_op,
                    cond_rhs,
                    true_val,
                    false_val,
                } => {
                    let frame = self.ctx.take_table("add")?;
                    require_columns(&frame, &[cond_col], "add")?;
                    let rhs = self.resolve_rhs(cond_rhs)?;
                    let condition = compare(cond_col, *cond_op, &rhs);
                    let then = branch_value(&frame, true_val);
                    let otherwise = branch_value(&frame, false_val);
                    let value = when(condition, then).otherwise(otherwise)?;
                    self.ctx.rebind(frame.with_column(col, value)?);
                }
                Command::Trim { col } => {
                    self.string_transform(col, "trim", |e| btrim(vec![e]))?;
                }
                Command::Uppercase { col } => {
                    self.string_transform(col, "uppercase", upper)?;
                }
                Command::Lowercase { col } => {
                    self.string_transform(col, "lowercase", lower)?;
                }
                Command::Cast { col, type_name } => {
                    let frame = self.ctx.take_table("cast")?;
                    require_columns(&frame, &[col], "cast")?;
                    let target = ops::cast_target(type_name)?;
                    let casted = try_cast_expr(ident(col), target);
                    self.ctx.rebind(frame.with_column(col, casted)?);
                }
                Command::Replace { col, old, new } => {
                    let frame = self.ctx.take_table("replace")?;
                    require_columns(&frame, &[col], "replace")?;
                    let old = rhs_to_expr(&RhsValue::coerce(old));
                    let new = rhs_to_expr(&RhsValue::coerce(new));
                    let replaced = when(ident(col).eq(old), new).otherwise(ident(col))?;
                    self.ctx.rebind(frame.with_column(col, replaced)?);
                }
                Command::Pivot {
                    index,
                    column,
                    value,
                } => {
                    let frame = self.ctx.take_table("pivot")?;
                    require_columns(
                        &frame,
                        &[index.as_str(), column.as_str(), value.as_str()],
                        "pivot",
                    )?;
                    let pivoted = ops::pivot(frame, index, column, value).await?;
                    self.ctx.rebind(pivoted);
                }

                // ------------------------------------------------- aggregation
                Command::GroupBy { cols } => {
                    let frame = self.ctx.table("group by")?;
                    let names: Vec<&str> = cols.iter().map(String::as_str).collect();
                    require_columns(frame, &names, "group by")?;
                    self.ctx.group_by = Some(cols.clone());
                }
                Command::Count => {
                    let groups = self.ctx.group_by.take();
                    let frame = self.ctx.take_table("count")?;
                    let counted = aggregate(frame, groups, vec![count(lit(1)).alias("count")])?;
                    self.ctx.table = Some(counted);
                }
                Command::CountIf { col, op, rhs } => {
                    let frame = self.ctx.table("count if")?.clone();
                    require_columns(&frame, &[col], "count if")?;
                    let rhs = self.resolve_rhs(rhs)?;
                    let n = frame.filter(compare(col, *op, &rhs))?.count().await?;
                    println!("count if {col} {} {rhs}: {n}", op.as_str());
                }
                Command::Sum { col } => self.single_aggregate(AggVerb::Sum, col).await?,
                Command::Avg { col } => self.single_aggregate(AggVerb::Avg, col).await?,
                Command::Min { col } => self.single_aggregate(AggVerb::Min, col).await?,
                Command::Max { col } => self.single_aggregate(AggVerb::Max, col).await?,
                Command::MultiAgg { specs } => {
                    let Some(groups) = self.ctx.group_by.take() else {
                        return Err(PplError::Runtime(
                            "agg requires an active 'group by'".to_string(),
                        ));
                    };
                    let frame = self.ctx.take_table("agg")?;
                    let aggregates = multi_agg_exprs(&frame, specs)?;
                    let aggregated = aggregate(frame, Some(groups), aggregates)?;
                    self.ctx.table = Some(aggregated);
                }

                // ------------------------------------------------ multi-source
                Command::Join { path, key, how } => {
                    let path = lex::substitute_variables(path, &self.ctx.variables)?;
                    lex::check_path_sandbox(&path, self.ctx.sandbox_dir.as_deref())?;
                    let left = self.ctx.take_table("join")?;
                    let right = ppl_io::load(&self.ctx.session, &path).await?;
                    self.ctx.rebind(ops::join(left, right, key, *how)?);
                }
                Command::Merge { path } => {
                    let path = lex::substitute_variables(path, &self.ctx.variables)?;
                    lex::check_path_sandbox(&path, self.ctx.sandbox_dir.as_deref())?;
                    let left = self.ctx.take_table("merge")?;
                    let right = ppl_io::load(&self.ctx.session, &path).await?;
                    self.ctx.rebind(ops::concat_diagonal(left, right)?);
                }

                // ----------------------------------------------------- output
                Command::Save { path } => {
                    let path = lex::substitute_variables(path, &self.ctx.variables)?;
                    lex::check_path_sandbox(&path, self.ctx.sandbox_dir.as_deref())?;
                    self.save(&path).await?;
                }
                Command::Print => {
                    let frame = self.ctx.table("print")?.clone();
                    let batches = frame.collect().await?;
                    print_batches(&batches)?;
                }
                Command::Schema => {
                    let frame = self.ctx.table("schema")?;
                    for field in frame.schema().fields() {
                        println!("{}: {}", field.name(), field.data_type());
                    }
                }
                Command::Inspect => {
                    let frame = self.ctx.table("inspect")?.clone();
                    println!("{}", ops::inspect(frame).await?);
                }
                Command::Head { n } => {
                    let frame = self.ctx.table("head")?.clone();
                    let batches = frame.limit(0, Some(*n))?.collect().await?;
                    print_batches(&batches)?;
                }
                Command::Log { message } => {
                    let message = lex::substitute_variables(message, &self.ctx.variables)?;
                    println!("[LOG] {message}");
                }
                Command::Timer { action, label } => self.timer(*action, label)?,

                // ---------------------------------------------------- quality
                Command::Assert { col, op, rhs } => {
                    let frame = self.ctx.table("assert")?.clone();
                    require_columns(&frame, &[col], "assert")?;
                    let rhs = self.resolve_rhs(rhs)?;
                    let condition = compare(col, *op, &rhs);
                    // Null comparisons count as violations, like the rows
                    // that plainly fail the predicate.
                    let violation = condition.clone().is_null().or(!condition);
                    let failing = frame.filter(violation)?.count().await?;
                    if failing > 0 {
                        return Err(PplError::Assertion(format!(
                            "{failing} row(s) violate: {col} {} {rhs}",
                            op.as_str()
                        )));
                    }
                }
                Command::Fill { col, strategy } => {
                    let frame = self.ctx.take_table("fill")?;
                    let filled = ops::fill(&self.ctx.session, frame, col, strategy).await?;
                    self.ctx.rebind(filled);
                }

                // -------------------------------------------------- variables
                Command::Set { name, value } => {
                    if name == "sandbox" {
                        self.ctx.sandbox_dir = Some(PathBuf::from(value));
                    }
                    self.ctx.variables.insert(name.clone(), value.clone());
                }
                Command::Env { var_name } => {
                    let value = std::env::var(var_name).map_err(|_| {
                        PplError::Runtime(format!(
                            "environment variable '{var_name}' is not set"
                        ))
                    })?;
                    self.ctx.variables.insert(var_name.clone(), value);
                }

                // --------------------------------------------- error recovery
                Command::Try { body, on_error } => {
                    if let Err(err) = self.run_seq(body, false).await {
                        match on_error {
                            HandlerSpec::Skip => {
                                debug!(error = %err, "try: error skipped");
                            }
                            HandlerSpec::Log(message) => {
                                println!("[TRY] {message}: {err}");
                            }
                            HandlerSpec::Run(handlers) => {
                                self.run_seq(handlers, false).await?;
                            }
                        }
                    }
                }

                // --------------------------------------------------- datetime
                Command::ParseDate { col, format } => {
                    let frame = self.ctx.take_table("parse_date")?;
                    require_columns(&frame, &[col], "parse_date")?;
                    let parsed = datetime::parse_date_expr(col, format);
                    self.ctx.rebind(frame.with_column(col, parsed)?);
                }
                Command::Extract { part, col, new_col } => {
                    let frame = self.ctx.take_table("extract")?;
                    require_columns(&frame, &[col], "extract")?;
                    let extracted = datetime::extract_expr(*part, col);
                    self.ctx.rebind(frame.with_column(new_col, extracted)?);
                }
                Command::DateDiff {
                    col1,
                    col2,
                    new_col,
                    unit,
                } => {
                    let frame = self.ctx.take_table("date_diff")?;
                    require_columns(&frame, &[col1.as_str(), col2.as_str()], "date_diff")?;
                    let diff = datetime::date_diff_expr(col1, col2, *unit);
                    self.ctx.rebind(frame.with_column(new_col, diff)?);
                }
                Command::FilterDate { col, op, iso_date } => {
                    let frame = self.ctx.take_table("filter_date")?;
                    require_columns(&frame, &[col], "filter_date")?;
                    let predicate = datetime::filter_date_expr(col, *op, iso_date)?;
                    self.ctx.rebind(frame.filter(predicate)?);
                }
                Command::TruncateDate { col, unit } => {
                    let frame = self.ctx.take_table("truncate_date")?;
                    require_columns(&frame, &[col], "truncate_date")?;
                    let truncated = datetime::truncate_expr(col, *unit);
                    self.ctx.rebind(frame.with_column(col, truncated)?);
                }
                Command::TsSort { col } => {
                    let frame = self.ctx.take_table("ts_sort")?;
                    require_columns(&frame, &[col], "ts_sort")?;
                    self.ctx.rebind(frame.sort(vec![ident(col).sort(true, false)])?);
                }
            }
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Resolve a `$var` right-hand side and re-coerce the substituted
    /// value.
    fn resolve_rhs(&self, rhs: &RhsValue) -> Result<RhsValue> {
        match rhs {
            RhsValue::Str(s) if s.starts_with('$') => {
                let resolved = lex::resolve_value(s, &self.ctx.variables)?;
                Ok(RhsValue::coerce(&resolved))
            }
            other => Ok(other.clone()),
        }
    }

    fn compound_predicate(
        &self,
        frame: &DataFrame,
        conds: &[Condition],
        logic: &[BoolOp],
    ) -> Result<Expr> {
        let mut resolved = Vec::with_capacity(conds.len());
        for (col, op, rhs) in conds {
            require_columns(frame, &[col], "filter")?;
            resolved.push(compare(col, *op, &self.resolve_rhs(rhs)?));
        }
        let mut iter = resolved.into_iter();
        let mut predicate = iter
            .next()
            .ok_or_else(|| PplError::Value("filter: empty compound condition".to_string()))?;
        for (next, combinator) in iter.zip(logic) {
            predicate = match combinator {
                BoolOp::And => predicate.and(next),
                BoolOp::Or => predicate.or(next),
            };
        }
        Ok(predicate)
    }

    fn string_transform(
        &mut self,
        col: &str,
        verb: &str,
        build: impl FnOnce(Expr) -> Expr,
    ) -> Result<()> {
        let frame = self.ctx.take_table(verb)?;
        require_columns(&frame, &[col], verb)?;
        let as_string = try_cast_expr(ident(col), datafusion::arrow::datatypes::DataType::Utf8);
        self.ctx.rebind(frame.with_column(col, build(as_string))?);
        Ok(())
    }

    async fn single_aggregate(&mut self, verb: AggVerb, col: &str) -> Result<()> {
        let groups = self.ctx.group_by.take();
        let frame = self.ctx.take_table(verb.as_str())?;
        require_columns(&frame, &[col], verb.as_str())?;
        let aggregate_expr = match verb {
            AggVerb::Sum => sum(ident(col)),
            AggVerb::Avg => avg(ident(col)),
            AggVerb::Min => min(ident(col)),
            AggVerb::Max => max(ident(col)),
            AggVerb::Count => count(ident(col)),
        }
        .alias(col);
        let aggregated = aggregate(frame, groups, vec![aggregate_expr])?;
        self.ctx.table = Some(aggregated);
        Ok(())
    }

    fn timer(&mut self, action: TimerAction, label: &str) -> Result<()> {
        let key = format!("{TIMER_PREFIX}{label}");
        match action {
            TimerAction::Start => {
                self.ctx.timers.insert(key, Instant::now());
            }
            TimerAction::Lap => {
                let started = self.ctx.timers.get(&key).ok_or_else(|| {
                    PplError::Runtime(format!("timer '{label}' was not started"))
                })?;
                println!("[LAP] {label}: {:.2}s", started.elapsed().as_secs_f64());
            }
            TimerAction::Stop => {
                let started = self.ctx.timers.remove(&key).ok_or_else(|| {
                    PplError::Runtime(format!("timer '{label}' was not started"))
                })?;
                println!("[TIMER] {label}: {:.2}s", started.elapsed().as_secs_f64());
            }
        }
        Ok(())
    }

    async fn save(&mut self, path: &str) -> Result<()> {
        if self.ctx.table.is_none() {
            return Err(PplError::Runtime(
                "save: no data to save — pipeline produced no output".to_string(),
            ));
        }
        let frame = self.ctx.table("save")?.clone();
        let schema: datafusion::arrow::datatypes::Schema = frame.schema().clone().into();
        let mut writer = ppl_io::TableWriter::create(path, std::sync::Arc::new(schema.clone()))?;

        let mut wrote_any = false;
        if self.ctx.streaming {
            let mut stream = frame.execute_stream().await?;
            while let Some(batch) = stream.next().await {
                writer.write(&batch?)?;
                wrote_any = true;
            }
        } else {
            for batch in frame.collect().await? {
                writer.write(&batch)?;
                wrote_any = true;
            }
        }
        if !wrote_any {
            // Header-only output for empty tables.
            writer.write(&RecordBatch::new_empty(std::sync::Arc::new(schema)))?;
        }
        writer.finish()
    }
}

/// Aggregate with optional grouping: grouped results carry the group
/// columns first, ungrouped results are a single row.
fn aggregate(
    frame: DataFrame,
    groups: Option<Vec<String>>,
    aggregates: Vec<Expr>,
) -> Result<DataFrame> {
    let group_exprs = groups
        .unwrap_or_default()
        .iter()
        .map(|g| ident(g))
        .collect();
    Ok(frame.aggregate(group_exprs, aggregates)?)
}

fn multi_agg_exprs(frame: &DataFrame, specs: &[AggSpec]) -> Result<Vec<Expr>> {
    let mut aggregates = Vec::with_capacity(specs.len());
    for spec in specs {
        match (&spec.verb, &spec.col) {
            (AggVerb::Count, _) => aggregates.push(count(lit(1)).alias("count")),
            (verb, Some(col)) => {
                require_columns(frame, &[col], "agg")?;
                let aggregate_expr = match verb {
                    AggVerb::Sum => sum(ident(col)),
                    AggVerb::Avg => avg(ident(col)),
                    AggVerb::Min => min(ident(col)),
                    AggVerb::Max => max(ident(col)),
                    AggVerb::Count => count(ident(col)),
                };
                aggregates.push(aggregate_expr.alias(col));
            }
            (verb, None) => {
                return Err(PplError::Value(format!(
                    "agg: '{}' requires a column",
                    verb.as_str()
                )))
            }
        }
    }
    Ok(aggregates)
}

/// Branch value of a conditional `add`: an existing column name refers to
/// that column, a numeric literal stays numeric, anything else is a
/// string.
fn branch_value(frame: &DataFrame, raw: &str) -> Expr {
    if has_column(frame, raw) {
        return ident(raw);
    }
    let stripped = lex::strip_quotes(raw);
    match stripped.parse::<f64>() {
        Ok(n) => lit(n),
        Err(_) => lit(stripped),
    }
}

fn print_batches(batches: &[RecordBatch]) -> Result<()> {
    let total: usize = batches.iter().map(|b| b.num_rows()).sum();
    if total == 0 {
        println!("(empty table)");
        return Ok(());
    }
    println!("{}", pretty_format_batches(batches)?);
    Ok(())
}

/// Parse-free convenience entry point: run commands on a fresh context
/// and materialise the result.
pub async fn run_pipeline(commands: &[Command]) -> Result<Option<Vec<RecordBatch>>> {
    let mut executor = Executor::new();
    executor.run(commands).await?;
    executor.finish().await
}
