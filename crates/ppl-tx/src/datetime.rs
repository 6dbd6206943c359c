//! Datetime operations, expressed over the engine's date functions.

use chrono::NaiveDate;
use datafusion::arrow::datatypes::{DataType, TimeUnit};
use datafusion::common::ScalarValue;
use datafusion::functions::expr_fn::{date_part, date_trunc, to_date};
use datafusion::prelude::{ident, lit, Expr};

use ppl_core::command::{CmpOp, DatePart, DiffUnit, TruncUnit};
use ppl_core::error::{PplError, Result};

use crate::ops::try_cast_expr;

/// `parse_date col "fmt"`: parse the column as strings with a chrono
/// format, replacing it with a date column.
pub fn parse_date_expr(col: &str, format: &str) -> Expr {
    to_date(vec![
        try_cast_expr(ident(col), DataType::Utf8),
        lit(format.to_string()),
    ])
}

/// `extract part col new_col`: pull one component out of a date column
/// as an integer.
pub fn extract_expr(part: DatePart, col: &str) -> Expr {
    let token = match part {
        DatePart::Year => "year",
        DatePart::Month => "month",
        DatePart::Day => "day",
        DatePart::Hour => "hour",
        DatePart::Minute => "minute",
        DatePart::Second => "second",
        // day-of-week, 0 = Sunday
        DatePart::Weekday => "dow",
        DatePart::Quarter => "quarter",
    };
    try_cast_expr(date_part(lit(token), ident(col)), DataType::Int64)
}

/// `date_diff col1 col2 new_col unit`: elapsed whole units between two
/// date columns, truncated toward zero.
pub fn date_diff_expr(col1: &str, col2: &str, unit: DiffUnit) -> Expr {
    let seconds =
        date_part(lit("epoch"), ident(col1)) - date_part(lit("epoch"), ident(col2));
    try_cast_expr(seconds / lit(unit.seconds()), DataType::Int64)
}

/// `filter_date col op YYYY-MM-DD`: comparison against an ISO date
/// literal. The literal is validated here so a malformed date is a value
/// error rather than an engine failure.
pub fn filter_date_expr(col: &str, op: CmpOp, iso_date: &str) -> Result<Expr> {
    let date = NaiveDate::parse_from_str(iso_date, "%Y-%m-%d").map_err(|_| {
        PplError::Value(format!(
            "invalid date literal '{iso_date}', expected YYYY-MM-DD"
        ))
    })?;
    // Date32 is days since the Unix epoch, which chrono's default date is.
    let days = (date - NaiveDate::default()).num_days() as i32;
    let left = try_cast_expr(ident(col), DataType::Date32);
    let right = lit(ScalarValue::Date32(Some(days)));
    Ok(match op {
        CmpOp::Gt => left.gt(right),
        CmpOp::Lt => left.lt(right),
        CmpOp::Ge => left.gt_eq(right),
        CmpOp::Le => left.lt_eq(right),
        CmpOp::Eq => left.eq(right),
        CmpOp::Ne => left.not_eq(right),
    })
}

/// `truncate_date col unit`: floor a date column to the unit boundary.
pub fn truncate_expr(col: &str, unit: TruncUnit) -> Expr {
    let timestamp = try_cast_expr(
        ident(col),
        DataType::Timestamp(TimeUnit::Microsecond, None),
    );
    date_trunc(lit(unit.as_str()), timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_literal_validation() {
        assert!(filter_date_expr("d", CmpOp::Ge, "2023-01-01").is_ok());
        assert!(matches!(
            filter_date_expr("d", CmpOp::Ge, "01/02/2023"),
            Err(PplError::Value(_))
        ));
        assert!(matches!(
            filter_date_expr("d", CmpOp::Ge, "2023-13-40"),
            Err(PplError::Value(_))
        ));
    }

    #[test]
    fn epoch_day_arithmetic() {
        // 1970-01-02 is day 1
        let date = NaiveDate::parse_from_str("1970-01-02", "%Y-%m-%d").unwrap();
        assert_eq!((date - NaiveDate::default()).num_days(), 1);
    }
}
