//! Table operations: the narrow surface the executor drives the engine
//! through.
//!
//! Plan-level operations stay lazy (DataFusion `Expr` rewrites on the
//! working `DataFrame`); operations the engine has no planner support
//! for (sampling, directional fill, inspection) collect the frame,
//! operate on `RecordBatch`es, and re-enter the lazy world through
//! `read_batches`.

use std::sync::Arc;

use datafusion::arrow::array::{Array, RecordBatch, UInt32Array};
use datafusion::arrow::compute::{concat_batches, take_record_batch};
use datafusion::arrow::datatypes::{DataType, Schema, SchemaRef};
use datafusion::arrow::util::display::array_value_to_string;
use datafusion::common::{JoinType, ScalarValue};
use datafusion::functions::expr_fn::coalesce;
use datafusion::functions_aggregate::expr_fn::{avg, count, median, sum};
use datafusion::logical_expr::expr::TryCast;
use datafusion::prelude::{ident, lit, when, DataFrame, Expr, SessionContext};

use ppl_core::command::{CmpOp, FillStrategy, JoinHow, RhsValue};
use ppl_core::error::{PplError, Result};

// ---------------------------------------------------------------------------
// Expression helpers
// ---------------------------------------------------------------------------

/// Fail with a key error when any of `cols` is absent from the frame.
pub fn require_columns<S: AsRef<str>>(frame: &DataFrame, cols: &[S], verb: &str) -> Result<()> {
    let schema = frame.schema();
    let missing: Vec<&str> = cols
        .iter()
        .map(AsRef::as_ref)
        .filter(|c| !schema.has_column_with_unqualified_name(c))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    let available: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
    Err(PplError::Key(format!(
        "{verb}: unknown column(s) {missing:?}. Available: {available:?}"
    )))
}

pub fn has_column(frame: &DataFrame, name: &str) -> bool {
    frame.schema().has_column_with_unqualified_name(name)
}

/// Unqualified data type of a column; callers check existence first.
pub fn column_type(frame: &DataFrame, name: &str) -> Option<DataType> {
    frame
        .schema()
        .fields()
        .iter()
        .find(|f| f.name() == name)
        .map(|f| f.data_type().clone())
}

pub fn rhs_to_expr(rhs: &RhsValue) -> Expr {
    match rhs {
        RhsValue::Number(n) => lit(*n),
        RhsValue::Str(s) => lit(s.clone()),
    }
}

/// Build the comparison expression for one `(column, op, rhs)` condition.
pub fn compare(col: &str, op: CmpOp, rhs: &RhsValue) -> Expr {
    let left = ident(col);
    let right = rhs_to_expr(rhs);
    match op {
        CmpOp::Gt => left.gt(right),
        CmpOp::Lt => left.lt(right),
        CmpOp::Ge => left.gt_eq(right),
        CmpOp::Le => left.lt_eq(right),
        CmpOp::Eq => left.eq(right),
        CmpOp::Ne => left.not_eq(right),
    }
}

/// Cast that yields null instead of failing on unconvertible values.
pub fn try_cast_expr(expr: Expr, data_type: DataType) -> Expr {
    Expr::TryCast(TryCast::new(Box::new(expr), data_type))
}

/// Map a `cast` target name onto an engine type.
pub fn cast_target(type_name: &str) -> Result<DataType> {
    match type_name.to_lowercase().as_str() {
        "int" | "integer" => Ok(DataType::Int64),
        "float" | "double" => Ok(DataType::Float64),
        "str" | "string" | "text" => Ok(DataType::Utf8),
        "datetime" => Ok(DataType::Timestamp(
            datafusion::arrow::datatypes::TimeUnit::Microsecond,
            None,
        )),
        "date" => Ok(DataType::Date32),
        "bool" | "boolean" => Ok(DataType::Boolean),
        other => Err(PplError::Value(format!(
            "cast: unknown type '{other}'. Supported: int, integer, float, double, \
             str, string, text, datetime, date, bool, boolean"
        ))),
    }
}

fn is_string_type(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
    )
}

// ---------------------------------------------------------------------------
// Batch-level plumbing
// ---------------------------------------------------------------------------

/// Collect a frame into batches, keeping its arrow schema for the
/// empty-result case.
pub async fn to_batches(frame: DataFrame) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let schema: Schema = frame.schema().clone().into();
    let batches = frame.collect().await?;
    Ok((Arc::new(schema), batches))
}

/// Re-enter the lazy world from collected batches.
pub fn from_batches(
    session: &SessionContext,
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
) -> Result<DataFrame> {
    if batches.is_empty() {
        Ok(session.read_batches(vec![RecordBatch::new_empty(schema)])?)
    } else {
        Ok(session.read_batches(batches)?)
    }
}

// ---------------------------------------------------------------------------
// Relational operations
// ---------------------------------------------------------------------------

/// Random row sample: absolute `n` (clamped to the table length) or a
/// percentage of rows. Selected rows keep their original order.
pub async fn sample(
    session: &SessionContext,
    frame: DataFrame,
    n: Option<usize>,
    pct: Option<f64>,
) -> Result<DataFrame> {
    let (schema, batches) = to_batches(frame).await?;
    let total: usize = batches.iter().map(|b| b.num_rows()).sum();
    let target = match (n, pct) {
        (Some(n), _) => n.min(total),
        (None, Some(pct)) => ((total as f64) * pct / 100.0).round() as usize,
        (None, None) => total,
    };
    if total == 0 || target >= total {
        return from_batches(session, schema, batches);
    }

    let combined = concat_batches(&batches[0].schema(), &batches)?;
    let mut rng = rand::thread_rng();
    let mut picked = rand::seq::index::sample(&mut rng, total, target).into_vec();
    picked.sort_unstable();
    let indices = UInt32Array::from(picked.iter().map(|&i| i as u32).collect::<Vec<u32>>());
    let sampled = take_record_batch(&combined, &indices)?;
    from_batches(session, schema, vec![sampled])
}

/// Join against `right`, coalescing the key column for join types that
/// can produce rows with no left-side match.
pub fn join(left: DataFrame, right: DataFrame, key: &str, how: JoinHow) -> Result<DataFrame> {
    if !has_column(&left, key) {
        return Err(PplError::Key(format!(
            "join: key '{key}' not found in the current table"
        )));
    }
    if !has_column(&right, key) {
        return Err(PplError::Key(format!(
            "join: key '{key}' not found in the joined file"
        )));
    }

    let right_key = format!("__ppl_right_{key}");
    let right = right.with_column_renamed(key, &right_key)?;
    let join_type = match how {
        JoinHow::Inner => JoinType::Inner,
        JoinHow::Left => JoinType::Left,
        JoinHow::Right => JoinType::Right,
        JoinHow::Outer => JoinType::Full,
    };
    let joined = left.join(right, join_type, &[key], &[right_key.as_str()], None)?;
    let joined = match how {
        JoinHow::Inner | JoinHow::Left => joined,
        // Rows coming only from the right side carry a null left key.
        JoinHow::Right | JoinHow::Outer => {
            joined.with_column(key, coalesce(vec![ident(key), ident(&right_key)]))?
        }
    };
    Ok(joined.drop_columns(&[right_key.as_str()])?)
}

/// Diagonal concatenation: the union of both column sets, with missing
/// columns filled with nulls and right-side types aligned to the left.
pub fn concat_diagonal(left: DataFrame, right: DataFrame) -> Result<DataFrame> {
    let mut fields: Vec<(String, DataType)> = left
        .schema()
        .fields()
        .iter()
        .map(|f| (f.name().clone(), f.data_type().clone()))
        .collect();
    for f in right.schema().fields() {
        if !fields.iter().any(|(name, _)| name == f.name()) {
            fields.push((f.name().clone(), f.data_type().clone()));
        }
    }

    let align = |frame: &DataFrame| -> Vec<Expr> {
        fields
            .iter()
            .map(|(name, data_type)| {
                if let Some(actual) = column_type(frame, name) {
                    if actual == *data_type {
                        ident(name)
                    } else {
                        try_cast_expr(ident(name), data_type.clone()).alias(name)
                    }
                } else {
                    try_cast_expr(lit(ScalarValue::Null), data_type.clone()).alias(name)
                }
            })
            .collect()
    };

    let left_aligned = left.clone().select(align(&left))?;
    let right_aligned = right.clone().select(align(&right))?;
    Ok(left_aligned.union(right_aligned)?)
}

/// Long→wide reshape: one output column per distinct pivot value, each a
/// `sum` over the value column where the pivot column matches.
pub async fn pivot(
    frame: DataFrame,
    index: &str,
    column: &str,
    value: &str,
) -> Result<DataFrame> {
    let distinct = frame
        .clone()
        .select(vec![ident(column)])?
        .distinct()?
        .sort(vec![ident(column).sort(true, false)])?
        .collect()
        .await?;

    let mut aggregates = Vec::new();
    for batch in &distinct {
        let array = batch.column(0);
        for row in 0..batch.num_rows() {
            let scalar = ScalarValue::try_from_array(array, row)?;
            if scalar.is_null() {
                continue;
            }
            let name = array_value_to_string(array, row)?;
            let matched = when(ident(column).eq(lit(scalar)), ident(value)).end()?;
            aggregates.push(sum(matched).alias(name));
        }
    }
    if aggregates.is_empty() {
        return Err(PplError::Value(format!(
            "pivot: column '{column}' has no values to pivot on"
        )));
    }
    Ok(frame.aggregate(vec![ident(index)], aggregates)?)
}

// ---------------------------------------------------------------------------
// Missing-value handling
// ---------------------------------------------------------------------------

/// Run a whole-table aggregate and pull out its single scalar result.
async fn aggregate_scalar(frame: DataFrame, aggregate: Expr) -> Result<ScalarValue> {
    let batches = frame
        .aggregate(vec![], vec![aggregate.alias("__ppl_scalar")])?
        .collect()
        .await?;
    for batch in &batches {
        if batch.num_rows() > 0 {
            return Ok(ScalarValue::try_from_array(batch.column(0), 0)?);
        }
    }
    Ok(ScalarValue::Null)
}

/// Most frequent non-null value, ties broken by value order.
async fn mode_scalar(frame: DataFrame, col: &str) -> Result<ScalarValue> {
    let batches = frame
        .filter(ident(col).is_not_null())?
        .aggregate(vec![ident(col)], vec![count(lit(1)).alias("__ppl_n")])?
        .sort(vec![
            ident("__ppl_n").sort(false, false),
            ident(col).sort(true, false),
        ])?
        .limit(0, Some(1))?
        .collect()
        .await?;
    for batch in &batches {
        if batch.num_rows() > 0 {
            return Ok(ScalarValue::try_from_array(batch.column(0), 0)?);
        }
    }
    Ok(ScalarValue::Null)
}

fn fill_nulls_with(frame: DataFrame, col: &str, value: Expr) -> Result<DataFrame> {
    let filled = when(ident(col).is_null(), value).otherwise(ident(col))?;
    Ok(frame.with_column(col, filled)?)
}

/// Propagate the nearest non-null value forward (or backward) through
/// the column. Operates on collected batches; the engine has no
/// order-aware fill.
async fn fill_directional(
    session: &SessionContext,
    frame: DataFrame,
    col: &str,
    backward: bool,
) -> Result<DataFrame> {
    let (schema, batches) = to_batches(frame).await?;
    let total: usize = batches.iter().map(|b| b.num_rows()).sum();
    if total == 0 {
        return from_batches(session, schema, batches);
    }

    let combined = concat_batches(&batches[0].schema(), &batches)?;
    let col_idx = combined
        .schema()
        .index_of(col)
        .map_err(|e| PplError::Key(format!("fill: {e}")))?;
    let array = combined.column(col_idx);

    let mut values = Vec::with_capacity(total);
    for row in 0..total {
        values.push(ScalarValue::try_from_array(array, row)?);
    }
    let mut carried: Option<ScalarValue> = None;
    let mut fill_one = |value: &mut ScalarValue| {
        if value.is_null() {
            if let Some(last) = &carried {
                *value = last.clone();
            }
        } else {
            carried = Some(value.clone());
        }
    };
    if backward {
        values.iter_mut().rev().for_each(&mut fill_one);
    } else {
        values.iter_mut().for_each(&mut fill_one);
    }

    let filled = ScalarValue::iter_to_array(values)?;
    let mut columns = combined.columns().to_vec();
    columns[col_idx] = filled;
    let rebuilt = RecordBatch::try_new(combined.schema(), columns)?;
    from_batches(session, schema, vec![rebuilt])
}

/// Apply a `fill` strategy to one column.
///
/// String columns have empty strings normalised to null first, so the
/// strategies treat `""` as missing.
pub async fn fill(
    session: &SessionContext,
    frame: DataFrame,
    col: &str,
    strategy: &FillStrategy,
) -> Result<DataFrame> {
    require_columns(&frame, &[col], "fill")?;

    let frame = match column_type(&frame, col) {
        Some(data_type) if is_string_type(&data_type) => {
            let normalised = when(ident(col).eq(lit("")), lit(ScalarValue::Utf8(None)))
                .otherwise(ident(col))?;
            frame.with_column(col, normalised)?
        }
        _ => frame,
    };

    match strategy {
        FillStrategy::Mean => {
            let scalar = aggregate_scalar(frame.clone(), avg(ident(col))).await?;
            if scalar.is_null() {
                return Ok(frame);
            }
            fill_nulls_with(frame, col, lit(scalar))
        }
        FillStrategy::Median => {
            let scalar = aggregate_scalar(frame.clone(), median(ident(col))).await?;
            if scalar.is_null() {
                return Ok(frame);
            }
            fill_nulls_with(frame, col, lit(scalar))
        }
        FillStrategy::Mode => {
            let scalar = mode_scalar(frame.clone(), col).await?;
            if scalar.is_null() {
                return Ok(frame);
            }
            fill_nulls_with(frame, col, lit(scalar))
        }
        FillStrategy::Forward => fill_directional(session, frame, col, false).await,
        FillStrategy::Backward => fill_directional(session, frame, col, true).await,
        FillStrategy::Drop => Ok(frame.filter(ident(col).is_not_null())?),
        FillStrategy::Literal(raw) => {
            let value = rhs_to_expr(&RhsValue::coerce(raw));
            fill_nulls_with(frame, col, value)
        }
    }
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

/// Per-column report: dtype, null-like count, and distinct count.
///
/// For string columns the null count includes empty strings; distinct
/// counts cover non-null rendered values.
pub async fn inspect(frame: DataFrame) -> Result<String> {
    let (schema, batches) = to_batches(frame).await?;
    let mut lines = Vec::with_capacity(schema.fields().len());

    for (idx, field) in schema.fields().iter().enumerate() {
        let mut nulls = 0usize;
        let mut distinct = std::collections::HashSet::new();
        for batch in &batches {
            let array = batch.column(idx);
            nulls += array.null_count();
            for row in 0..array.len() {
                if array.is_null(row) {
                    continue;
                }
                let rendered = array_value_to_string(array, row)?;
                if is_string_type(field.data_type()) && rendered.is_empty() {
                    nulls += 1;
                    continue;
                }
                distinct.insert(rendered);
            }
        }
        lines.push(format!(
            "{}: {}, {} null(s), {} distinct",
            field.name(),
            field.data_type(),
            nulls,
            distinct.len()
        ));
    }
    Ok(lines.join("\n"))
}
