//! Two-phase parser: cleaned lines in, ordered command list out.
//!
//! Phase one dispatches each line on its lowercased first keyword. Phase
//! two assembles `try` blocks: the scanner tracks nesting depth so each
//! `try` pairs with its own `on_error`, and body lines are re-parsed
//! recursively with their original line numbers preserved.

use std::sync::LazyLock;

use regex::Regex;

use crate::command::{
    split_condition, AggSpec, AggVerb, BoolOp, CmpOp, Command, Condition, DatePart, DiffUnit,
    FillStrategy, HandlerSpec, JoinHow, TimerAction, TruncUnit, OPERATORS,
};
use crate::error::{PplError, Result};
use crate::lex::{split_quoted, strip_quotes};

/// Every verb the language accepts, for the unknown-command message.
const SUPPORTED: &[&str] = &[
    "add", "agg", "assert", "avg", "cast", "count", "date_diff", "distinct", "drop", "env",
    "extract", "fill", "filter", "filter_date", "foreach", "group", "head", "include", "inspect",
    "join", "limit", "log", "lowercase", "max", "merge", "min", "on_error", "parse_date", "pivot",
    "print", "rename", "replace", "sample", "save", "schema", "select", "set", "sort", "source",
    "sum", "timer", "trim", "truncate_date", "try", "ts_sort", "uppercase", "where",
];

static QUOTED_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^["']([^"']+)["'](.*)$"#).unwrap());

fn syntax(line: usize, message: impl Into<String>) -> PplError {
    PplError::Syntax {
        line,
        message: message.into(),
    }
}

/// Split a line into its keyword and the remainder.
fn split_keyword(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((kw, rest)) => (kw, rest.trim()),
        None => (line, ""),
    }
}

/// Convert cleaned `.ppl` lines into an ordered command list.
pub fn parse_lines(lines: &[String]) -> Result<Vec<Command>> {
    parse_block(lines, 1)
}

fn parse_block(lines: &[String], base: usize) -> Result<Vec<Command>> {
    let mut commands = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let (keyword, rest) = split_keyword(&lines[i]);
        if keyword.eq_ignore_ascii_case("try") {
            let (command, consumed) = parse_try(lines, i, base)?;
            commands.push(command);
            i += consumed;
        } else {
            commands.push(parse_command(keyword, rest, base + i)?);
            i += 1;
        }
    }
    Ok(commands)
}

/// Assemble one `try` block starting at `lines[start]`.
///
/// Depth starts at 1; each nested `try` increments it and each `on_error`
/// decrements it, so the `on_error` that drops the depth to zero is the
/// one that belongs to this block.
fn parse_try(lines: &[String], start: usize, base: usize) -> Result<(Command, usize)> {
    let mut depth = 1usize;
    let mut end = start + 1;
    while end < lines.len() {
        let (keyword, _) = split_keyword(&lines[end]);
        if keyword.eq_ignore_ascii_case("try") {
            depth += 1;
        } else if keyword.eq_ignore_ascii_case("on_error") {
            depth -= 1;
            if depth == 0 {
                break;
            }
        }
        end += 1;
    }
    if end == lines.len() {
        return Err(syntax(
            base + start,
            "'try' without matching 'on_error'",
        ));
    }

    let body = parse_block(&lines[start + 1..end], base + start + 1)?;
    let handler_line = base + end;
    let (_, action) = split_keyword(&lines[end]);
    if action.is_empty() {
        return Err(syntax(
            handler_line,
            "'on_error' requires an action: skip, log \"msg\", or a recovery command",
        ));
    }

    let (action_kw, action_rest) = split_keyword(action);
    let on_error = if action.eq_ignore_ascii_case("skip") {
        HandlerSpec::Skip
    } else if action_kw.eq_ignore_ascii_case("log") {
        HandlerSpec::Log(strip_quotes(action_rest))
    } else {
        HandlerSpec::Run(vec![parse_command(action_kw, action_rest, handler_line)?])
    };

    Ok((Command::Try { body, on_error }, end - start + 1))
}

fn parse_command(keyword: &str, rest: &str, line: usize) -> Result<Command> {
    match keyword.to_lowercase().as_str() {
        "source" => parse_source(rest, line),
        "foreach" => {
            let pattern = strip_quotes(rest);
            if pattern.is_empty() {
                return Err(syntax(
                    line,
                    "'foreach' requires a glob pattern. Example: foreach \"data/monthly/*.csv\"",
                ));
            }
            Ok(Command::Foreach { pattern })
        }
        "include" => {
            let path = strip_quotes(rest);
            if path.is_empty() {
                return Err(syntax(
                    line,
                    "'include' requires a file path. Example: include \"shared/clean.ppl\"",
                ));
            }
            Ok(Command::Include { path })
        }
        "filter" | "where" => parse_filter(rest, line),
        "select" => Ok(Command::Select {
            cols: parse_columns(rest, line, "select", "select name, age")?,
        }),
        "drop" => Ok(Command::Drop {
            cols: parse_columns(rest, line, "drop", "drop salary, department")?,
        }),
        "limit" => Ok(Command::Limit {
            n: parse_count_arg(rest, line, "limit", "limit 100")?,
        }),
        "distinct" => Ok(Command::Distinct),
        "sample" => parse_sample(rest, line),
        "sort" => parse_sort(rest, line),
        "rename" => {
            let parts: Vec<&str> = rest.split_whitespace().collect();
            if parts.len() != 2 {
                return Err(syntax(
                    line,
                    "'rename' requires exactly two column names. Example: rename old_name new_name",
                ));
            }
            Ok(Command::Rename {
                old: parts[0].to_string(),
                new: parts[1].to_string(),
            })
        }
        "add" => parse_add(rest, line),
        "trim" => parse_single_column(rest, line, "trim").map(|col| Command::Trim { col }),
        "uppercase" => {
            parse_single_column(rest, line, "uppercase").map(|col| Command::Uppercase { col })
        }
        "lowercase" => {
            parse_single_column(rest, line, "lowercase").map(|col| Command::Lowercase { col })
        }
        "cast" => {
            let parts: Vec<&str> = rest.split_whitespace().collect();
            if parts.len() != 2 {
                return Err(syntax(
                    line,
                    "'cast' requires a column and a type. Example: cast age int",
                ));
            }
            Ok(Command::Cast {
                col: parts[0].to_string(),
                type_name: parts[1].to_string(),
            })
        }
        "replace" => {
            let parts = split_quoted(rest);
            if parts.len() != 3 {
                return Err(syntax(
                    line,
                    "'replace' requires a column, an old value, and a new value. \
                     Example: replace country \"Germany\" \"DE\"",
                ));
            }
            let mut it = parts.into_iter();
            Ok(Command::Replace {
                col: it.next().unwrap_or_default(),
                old: it.next().unwrap_or_default(),
                new: it.next().unwrap_or_default(),
            })
        }
        "pivot" => parse_pivot(rest, line),
        "group" => parse_group_by(rest, line),
        "count" => parse_count(rest, line),
        "sum" => parse_single_column(rest, line, "sum").map(|col| Command::Sum { col }),
        "avg" => parse_single_column(rest, line, "avg").map(|col| Command::Avg { col }),
        "min" => parse_single_column(rest, line, "min").map(|col| Command::Min { col }),
        "max" => parse_single_column(rest, line, "max").map(|col| Command::Max { col }),
        "agg" => parse_agg(rest, line),
        "join" => parse_join(rest, line),
        "merge" => {
            let path = strip_quotes(rest);
            if path.is_empty() {
                return Err(syntax(
                    line,
                    "'merge' requires a file path. Example: merge \"data/extra.csv\"",
                ));
            }
            Ok(Command::Merge { path })
        }
        "save" => {
            let path = strip_quotes(rest);
            if path.is_empty() {
                return Err(syntax(
                    line,
                    "'save' requires a file path. Example: save \"output/results.csv\"",
                ));
            }
            Ok(Command::Save { path })
        }
        "print" => Ok(Command::Print),
        "schema" => Ok(Command::Schema),
        "inspect" => Ok(Command::Inspect),
        "head" => Ok(Command::Head {
            n: parse_count_arg(rest, line, "head", "head 10")?,
        }),
        "log" => {
            if rest.is_empty() {
                return Err(syntax(
                    line,
                    "'log' requires a message. Example: log \"processing $region\"",
                ));
            }
            Ok(Command::Log {
                message: strip_quotes(rest),
            })
        }
        "timer" => parse_timer(rest, line),
        "assert" => {
            let (col, op, rhs) = split_condition(rest, line, "assert")?;
            Ok(Command::Assert { col, op, rhs })
        }
        "fill" => parse_fill(rest, line),
        "set" => parse_set(rest, line),
        "env" => {
            let parts: Vec<&str> = rest.split_whitespace().collect();
            if parts.len() != 1 {
                return Err(syntax(
                    line,
                    "'env' requires an environment variable name. Example: env DATA_PATH",
                ));
            }
            Ok(Command::Env {
                var_name: parts[0].to_string(),
            })
        }
        "on_error" => Err(syntax(line, "'on_error' without matching 'try'")),
        "parse_date" => {
            let mut parts = rest.splitn(2, char::is_whitespace);
            match (parts.next(), parts.next()) {
                (Some(col), Some(fmt)) if !col.is_empty() && !fmt.trim().is_empty() => {
                    Ok(Command::ParseDate {
                        col: col.to_string(),
                        format: strip_quotes(fmt),
                    })
                }
                _ => Err(syntax(
                    line,
                    "'parse_date' requires a column and a format. \
                     Example: parse_date signup \"%Y-%m-%d\"",
                )),
            }
        }
        "extract" => parse_extract(rest, line),
        "date_diff" => parse_date_diff(rest, line),
        "filter_date" => parse_filter_date(rest, line),
        "truncate_date" => parse_truncate_date(rest, line),
        "ts_sort" => {
            parse_single_column(rest, line, "ts_sort").map(|col| Command::TsSort { col })
        }
        unknown => Err(syntax(
            line,
            format!(
                "unknown command '{unknown}'. Supported commands: {}",
                SUPPORTED.join(", ")
            ),
        )),
    }
}

// ---------------------------------------------------------------------------
// Individual command parsers
// ---------------------------------------------------------------------------

/// Split a leading quoted path off `rest`; fall back to the first
/// whitespace token for unquoted paths.
fn split_path(rest: &str) -> (String, String) {
    if let Some(caps) = QUOTED_PATH_RE.captures(rest) {
        return (caps[1].to_string(), caps[2].trim().to_string());
    }
    match rest.split_once(char::is_whitespace) {
        Some((path, remainder)) => (path.to_string(), remainder.trim().to_string()),
        None => (rest.to_string(), String::new()),
    }
}

fn parse_source(rest: &str, line: usize) -> Result<Command> {
    if rest.is_empty() {
        return Err(syntax(
            line,
            "'source' requires a file path. Example: source \"data/people.csv\"",
        ));
    }
    let (path, remainder) = split_path(rest);
    let chunk_size = if remainder.is_empty() {
        None
    } else {
        let parts: Vec<&str> = remainder.split_whitespace().collect();
        match parts.as_slice() {
            [kw, n] if kw.eq_ignore_ascii_case("chunk") => match n.parse::<usize>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    return Err(syntax(
                        line,
                        format!("'chunk' requires a positive integer, got '{n}'"),
                    ))
                }
            },
            _ => {
                return Err(syntax(
                    line,
                    format!("unexpected 'source' arguments '{remainder}'. Expected: chunk N"),
                ))
            }
        }
    };
    Ok(Command::Source { path, chunk_size })
}

/// Split a condition string on whitespace-surrounded `and`/`or`
/// combinators, ignoring any that sit inside quoted literals.
///
/// Quote state is tracked while scanning, so an RHS like
/// `"Procter and Gamble"` is never treated as parser-significant text.
/// All scanning happens at ASCII bytes (whitespace, quotes, the
/// combinator words), so byte offsets are valid slice boundaries.
fn split_logic(rest: &str) -> (Vec<&str>, Vec<BoolOp>) {
    let bytes = rest.as_bytes();
    let mut segments = Vec::new();
    let mut logic = Vec::new();
    let mut quote: Option<u8> = None;
    let mut seg_start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
                i += 1;
            }
            None => match b {
                b'"' | b'\'' => {
                    quote = Some(b);
                    i += 1;
                }
                _ if b.is_ascii_whitespace() => {
                    let mut j = i;
                    while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                        j += 1;
                    }
                    let word_start = j;
                    while j < bytes.len() && bytes[j].is_ascii_alphabetic() {
                        j += 1;
                    }
                    let word = &rest[word_start..j];
                    let followed_by_space = j < bytes.len() && bytes[j].is_ascii_whitespace();
                    let combinator = if !followed_by_space {
                        None
                    } else if word.eq_ignore_ascii_case("and") {
                        Some(BoolOp::And)
                    } else if word.eq_ignore_ascii_case("or") {
                        Some(BoolOp::Or)
                    } else {
                        None
                    };
                    if let Some(op) = combinator {
                        segments.push(&rest[seg_start..i]);
                        logic.push(op);
                        let mut k = j;
                        while k < bytes.len() && bytes[k].is_ascii_whitespace() {
                            k += 1;
                        }
                        seg_start = k;
                        i = k;
                    } else {
                        i += 1;
                    }
                }
                _ => {
                    i += 1;
                }
            },
        }
    }
    segments.push(&rest[seg_start..]);
    (segments, logic)
}

fn parse_filter(rest: &str, line: usize) -> Result<Command> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Err(syntax(
            line,
            "could not parse 'filter' condition ''. \
             Expected: filter <column> <op> <value>  (e.g. filter age > 18)",
        ));
    }

    let (segments, logic) = split_logic(rest);
    let conds: Vec<Condition> = segments
        .into_iter()
        .map(|seg| split_condition(seg, line, "filter"))
        .collect::<Result<_>>()?;

    if conds.len() == 1 {
        let (col, op, rhs) = conds.into_iter().next().expect("one condition");
        Ok(Command::Filter { col, op, rhs })
    } else {
        Ok(Command::CompoundFilter { conds, logic })
    }
}

fn parse_columns(rest: &str, line: usize, verb: &str, example: &str) -> Result<Vec<String>> {
    let cols: Vec<String> = rest
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    if cols.is_empty() {
        return Err(syntax(
            line,
            format!("'{verb}' requires at least one column. Example: {example}"),
        ));
    }
    Ok(cols)
}

fn parse_single_column(rest: &str, line: usize, verb: &str) -> Result<String> {
    let col = rest.trim();
    if col.is_empty() || col.split_whitespace().count() != 1 {
        return Err(syntax(
            line,
            format!("'{verb}' requires a column name. Example: {verb} salary"),
        ));
    }
    Ok(col.to_string())
}

fn parse_count_arg(rest: &str, line: usize, verb: &str, example: &str) -> Result<usize> {
    rest.trim().parse::<usize>().map_err(|_| {
        syntax(
            line,
            format!("'{verb}' requires a positive integer. Example: {example}"),
        )
    })
}

fn parse_sample(rest: &str, line: usize) -> Result<Command> {
    let rest = rest.trim();
    if let Some(pct_str) = rest.strip_suffix('%') {
        let pct: f64 = pct_str.trim().parse().map_err(|_| {
            syntax(
                line,
                format!("'sample' requires a number before '%', got '{pct_str}'"),
            )
        })?;
        if pct <= 0.0 || pct > 100.0 {
            return Err(syntax(
                line,
                format!("'sample' percentage must be in (0, 100], got {pct}"),
            ));
        }
        return Ok(Command::Sample {
            n: None,
            pct: Some(pct),
        });
    }
    let n = rest.parse::<usize>().map_err(|_| {
        syntax(
            line,
            "'sample' requires a row count or percentage. Example: sample 50  |  sample 10%",
        )
    })?;
    Ok(Command::Sample {
        n: Some(n),
        pct: None,
    })
}

fn parse_sort(rest: &str, line: usize) -> Result<Command> {
    let lowered = rest.to_lowercase();
    if !lowered.starts_with("by") {
        return Err(syntax(
            line,
            "'sort' must be followed by 'by'. Example: sort by age desc",
        ));
    }
    let remainder = rest[2..].trim();
    let parts: Vec<&str> = remainder
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        return Err(syntax(
            line,
            "'sort by' requires at least one column. Example: sort by age desc",
        ));
    }
    let mut cols = Vec::with_capacity(parts.len());
    let mut ascending = Vec::with_capacity(parts.len());
    for part in parts {
        let tokens: Vec<&str> = part.split_whitespace().collect();
        let col = tokens[0];
        let direction = tokens.get(1).map(|d| d.to_lowercase());
        let asc = match direction.as_deref() {
            None | Some("asc") => true,
            Some("desc") => false,
            Some(other) => {
                return Err(syntax(
                    line,
                    format!("sort direction must be 'asc' or 'desc', got '{other}'"),
                ))
            }
        };
        cols.push(col.to_string());
        ascending.push(asc);
    }
    Ok(Command::Sort { cols, ascending })
}

fn parse_add(rest: &str, line: usize) -> Result<Command> {
    let Some((col, expr)) = rest.split_once('=') else {
        return Err(syntax(
            line,
            "'add' requires '='. Example: add tax = price * 0.2",
        ));
    };
    let col = col.trim();
    let expr = expr.trim();
    if col.is_empty() || expr.is_empty() {
        return Err(syntax(
            line,
            "'add' requires a column name and expression. Example: add tax = price * 0.2",
        ));
    }
    if expr
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("if "))
    {
        return parse_add_if(col, expr, line);
    }
    Ok(Command::Add {
        col: col.to_string(),
        expr: expr.to_string(),
    })
}

/// Byte offset of an ASCII `needle` in `haystack`, case-insensitively.
/// Needles start with a space, so a match is always a char boundary.
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

/// `add col = if COND then V else W` dispatches here.
fn parse_add_if(col: &str, expr: &str, line: usize) -> Result<Command> {
    let then_idx = find_ascii_ci(expr, " then ");
    let else_idx = find_ascii_ci(expr, " else ");
    let (Some(then_idx), Some(else_idx)) = (then_idx, else_idx) else {
        return Err(syntax(
            line,
            "conditional 'add' requires 'then' and 'else'. \
             Example: add tier = if salary > 80000 then \"senior\" else \"junior\"",
        ));
    };
    if else_idx < then_idx {
        return Err(syntax(line, "'else' must come after 'then' in conditional 'add'"));
    }
    if then_idx < 3 {
        return Err(syntax(
            line,
            "conditional 'add' requires a condition between 'if' and 'then'",
        ));
    }
    let cond = expr[3..then_idx].trim();
    let true_val = expr[then_idx + 6..else_idx].trim();
    let false_val = expr[else_idx + 6..].trim();
    if true_val.is_empty() || false_val.is_empty() {
        return Err(syntax(line, "conditional 'add' branches must not be empty"));
    }
    let (cond_col, cond_op, cond_rhs) = split_condition(cond, line, "add")?;
    Ok(Command::AddIf {
        col: col.to_string(),
        cond_col,
        cond_op,
        cond_rhs,
        true_val: true_val.to_string(),
        false_val: false_val.to_string(),
    })
}

fn parse_pivot(rest: &str, line: usize) -> Result<Command> {
    let mut index = None;
    let mut column = None;
    let mut value = None;
    for token in rest.split_whitespace() {
        let Some((key, val)) = token.split_once('=') else {
            return Err(syntax(
                line,
                format!("'pivot' expects key=value tokens, got '{token}'"),
            ));
        };
        match key {
            "index" => index = Some(val.to_string()),
            "column" => column = Some(val.to_string()),
            "value" => value = Some(val.to_string()),
            other => {
                return Err(syntax(
                    line,
                    format!("'pivot' got unknown key '{other}'. Expected index, column, value"),
                ))
            }
        }
    }
    match (index, column, value) {
        (Some(index), Some(column), Some(value)) => Ok(Command::Pivot {
            index,
            column,
            value,
        }),
        _ => Err(syntax(
            line,
            "'pivot' requires index=, column= and value=. \
             Example: pivot index=country column=year value=revenue",
        )),
    }
}

fn parse_group_by(rest: &str, line: usize) -> Result<Command> {
    let lowered = rest.to_lowercase();
    if !lowered.starts_with("by") {
        return Err(syntax(
            line,
            "'group' must be followed by 'by'. Example: group by country",
        ));
    }
    let remainder = rest[2..].trim();
    let cols = parse_columns(remainder, line, "group by", "group by country")?;
    Ok(Command::GroupBy { cols })
}

fn parse_count(rest: &str, line: usize) -> Result<Command> {
    if rest.is_empty() {
        return Ok(Command::Count);
    }
    let (kw, cond) = split_keyword(rest);
    if kw.eq_ignore_ascii_case("if") {
        let (col, op, rhs) = split_condition(cond, line, "count if")?;
        return Ok(Command::CountIf { col, op, rhs });
    }
    Err(syntax(
        line,
        format!("'count' takes no arguments (or 'count if <condition>'), got '{rest}'"),
    ))
}

fn parse_agg(rest: &str, line: usize) -> Result<Command> {
    let mut specs = Vec::new();
    for raw in rest.split(',') {
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        match tokens.as_slice() {
            [] => continue,
            [verb] if verb.eq_ignore_ascii_case("count") => specs.push(AggSpec {
                verb: AggVerb::Count,
                col: None,
            }),
            [verb, col] => {
                let Some(verb) = AggVerb::parse(&verb.to_lowercase()) else {
                    return Err(syntax(
                        line,
                        format!("'agg' got unknown verb '{verb}'. Supported: sum, avg, min, max, count"),
                    ));
                };
                if verb == AggVerb::Count {
                    return Err(syntax(line, "'agg' count takes no column"));
                }
                specs.push(AggSpec {
                    verb,
                    col: Some((*col).to_string()),
                });
            }
            _ => {
                return Err(syntax(
                    line,
                    format!("could not parse 'agg' spec '{}'", raw.trim()),
                ))
            }
        }
    }
    if specs.is_empty() {
        return Err(syntax(
            line,
            "'agg' requires at least one spec. Example: agg sum salary, count",
        ));
    }
    Ok(Command::MultiAgg { specs })
}

fn parse_join(rest: &str, line: usize) -> Result<Command> {
    let Some(caps) = QUOTED_PATH_RE.captures(rest) else {
        return Err(syntax(
            line,
            "'join' requires a quoted file path. Example: join \"data/other.csv\" on id",
        ));
    };
    let path = caps[1].to_string();
    let remainder = caps[2].trim();
    let (on_kw, key_part) = split_keyword(remainder);
    if !on_kw.eq_ignore_ascii_case("on") || key_part.is_empty() {
        return Err(syntax(
            line,
            "'join' requires 'on <column>'. Example: join \"data/other.csv\" on id",
        ));
    }
    let tokens: Vec<&str> = key_part.split_whitespace().collect();
    let (key, how) = match tokens.as_slice() {
        [key] => (key, JoinHow::Inner),
        [key, how] => match JoinHow::parse(&how.to_lowercase()) {
            Some(how) => (key, how),
            None => {
                return Err(syntax(
                    line,
                    format!("invalid join type '{how}'. Supported: inner, left, right, outer"),
                ))
            }
        },
        _ => {
            return Err(syntax(
                line,
                "'join … on' requires a key column and optional join type",
            ))
        }
    };
    Ok(Command::Join {
        path,
        key: (*key).to_string(),
        how,
    })
}

fn parse_timer(rest: &str, line: usize) -> Result<Command> {
    let parts: Vec<&str> = rest.split_whitespace().collect();
    let [action, label] = parts.as_slice() else {
        return Err(syntax(
            line,
            "'timer' requires an action and a label. Example: timer start load",
        ));
    };
    let action = match action.to_lowercase().as_str() {
        "start" => TimerAction::Start,
        "stop" => TimerAction::Stop,
        "lap" => TimerAction::Lap,
        other => {
            return Err(syntax(
                line,
                format!("timer action must be start, stop or lap, got '{other}'"),
            ))
        }
    };
    Ok(Command::Timer {
        action,
        label: (*label).to_string(),
    })
}

fn parse_fill(rest: &str, line: usize) -> Result<Command> {
    let mut parts = rest.splitn(2, char::is_whitespace);
    match (parts.next(), parts.next()) {
        (Some(col), Some(strategy)) if !col.is_empty() && !strategy.trim().is_empty() => {
            Ok(Command::Fill {
                col: col.to_string(),
                strategy: FillStrategy::parse(strategy.trim()),
            })
        }
        _ => Err(syntax(
            line,
            "'fill' requires a column and a strategy or value. \
             Example: fill age mean  |  fill country \"Unknown\"",
        )),
    }
}

fn parse_set(rest: &str, line: usize) -> Result<Command> {
    let Some((name, value)) = rest.split_once('=') else {
        return Err(syntax(
            line,
            "'set' requires '='. Example: set threshold = 50000",
        ));
    };
    let name = name.trim();
    let value = strip_quotes(value);
    if name.is_empty() || value.is_empty() {
        return Err(syntax(
            line,
            "'set' requires a name and a value. Example: set threshold = 50000",
        ));
    }
    Ok(Command::Set {
        name: name.to_string(),
        value,
    })
}

fn parse_extract(rest: &str, line: usize) -> Result<Command> {
    let parts: Vec<&str> = rest.split_whitespace().collect();
    let [part, col, new_col] = parts.as_slice() else {
        return Err(syntax(
            line,
            "'extract' requires a part, a column, and a new column. \
             Example: extract year signup signup_year",
        ));
    };
    let Some(part) = DatePart::parse(&part.to_lowercase()) else {
        return Err(syntax(
            line,
            format!(
                "unknown date part '{part}'. Supported: year, month, day, hour, \
                 minute, second, weekday, quarter"
            ),
        ));
    };
    Ok(Command::Extract {
        part,
        col: (*col).to_string(),
        new_col: (*new_col).to_string(),
    })
}

fn parse_date_diff(rest: &str, line: usize) -> Result<Command> {
    let parts: Vec<&str> = rest.split_whitespace().collect();
    let [col1, col2, new_col, unit] = parts.as_slice() else {
        return Err(syntax(
            line,
            "'date_diff' requires two columns, a new column, and a unit. \
             Example: date_diff shipped ordered lead_time days",
        ));
    };
    let Some(unit) = DiffUnit::parse(&unit.to_lowercase()) else {
        return Err(syntax(
            line,
            format!("unknown date_diff unit '{unit}'. Supported: days, hours, minutes, seconds"),
        ));
    };
    Ok(Command::DateDiff {
        col1: (*col1).to_string(),
        col2: (*col2).to_string(),
        new_col: (*new_col).to_string(),
        unit,
    })
}

fn parse_filter_date(rest: &str, line: usize) -> Result<Command> {
    let rest = rest.trim();
    for op_str in OPERATORS {
        if let Some(idx) = rest.find(op_str) {
            let col = rest[..idx].trim();
            let date = rest[idx + op_str.len()..].trim();
            if col.is_empty() || date.is_empty() {
                break;
            }
            let op = CmpOp::parse(op_str).expect("operator table entry");
            return Ok(Command::FilterDate {
                col: col.to_string(),
                op,
                iso_date: strip_quotes(date),
            });
        }
    }
    Err(syntax(
        line,
        "could not parse 'filter_date' condition. \
         Expected: filter_date <column> <op> <YYYY-MM-DD>",
    ))
}

fn parse_truncate_date(rest: &str, line: usize) -> Result<Command> {
    let parts: Vec<&str> = rest.split_whitespace().collect();
    let [col, unit] = parts.as_slice() else {
        return Err(syntax(
            line,
            "'truncate_date' requires a column and a unit. Example: truncate_date ts month",
        ));
    };
    let Some(unit) = TruncUnit::parse(&unit.to_lowercase()) else {
        return Err(syntax(
            line,
            format!("unknown truncate_date unit '{unit}'. Supported: year, month, week, day, hour"),
        ));
    };
    Ok(Command::TruncateDate {
        col: (*col).to_string(),
        unit,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::RhsValue;

    fn parse(lines: &[&str]) -> Result<Vec<Command>> {
        let owned: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        parse_lines(&owned)
    }

    fn parse1(line: &str) -> Command {
        let mut cmds = parse(&[line]).expect("parse");
        assert_eq!(cmds.len(), 1);
        cmds.pop().expect("one command")
    }

    // -- loading ------------------------------------------------------------

    #[test]
    fn source_basic() {
        assert_eq!(
            parse1("source \"data/people.csv\""),
            Command::Source {
                path: "data/people.csv".into(),
                chunk_size: None
            }
        );
    }

    #[test]
    fn source_chunk_size() {
        assert_eq!(
            parse1("source \"data/big.csv\" chunk 50000"),
            Command::Source {
                path: "data/big.csv".into(),
                chunk_size: Some(50000)
            }
        );
    }

    #[test]
    fn source_single_quotes() {
        let Command::Source { path, .. } = parse1("source 'data/file.csv'") else {
            panic!("expected Source")
        };
        assert_eq!(path, "data/file.csv");
    }

    #[test]
    fn source_chunk_case_insensitive() {
        let Command::Source { chunk_size, .. } = parse1("source \"big.csv\" CHUNK 1000") else {
            panic!("expected Source")
        };
        assert_eq!(chunk_size, Some(1000));
    }

    #[test]
    fn source_missing_path_is_syntax_error() {
        let err = parse(&["source"]).unwrap_err();
        assert!(err.to_string().starts_with("Line 1:"));
        assert!(err.to_string().contains("source"));
    }

    #[test]
    fn source_bad_chunk_is_syntax_error() {
        assert!(parse(&["source \"file.csv\" chunk abc"]).is_err());
        assert!(parse(&["source \"file.csv\" chunk 0"]).is_err());
    }

    #[test]
    fn foreach_basic() {
        assert_eq!(
            parse1("foreach \"data/monthly/*.csv\""),
            Command::Foreach {
                pattern: "data/monthly/*.csv".into()
            }
        );
    }

    #[test]
    fn include_basic() {
        assert_eq!(
            parse1("include \"shared/clean.ppl\""),
            Command::Include {
                path: "shared/clean.ppl".into()
            }
        );
    }

    // -- filtering ----------------------------------------------------------

    #[test]
    fn filter_gt() {
        assert_eq!(
            parse1("filter age > 18"),
            Command::Filter {
                col: "age".into(),
                op: CmpOp::Gt,
                rhs: RhsValue::Number(18.0)
            }
        );
    }

    #[test]
    fn filter_all_operators() {
        for (text, op) in [
            (">", CmpOp::Gt),
            ("<", CmpOp::Lt),
            (">=", CmpOp::Ge),
            ("<=", CmpOp::Le),
            ("==", CmpOp::Eq),
            ("!=", CmpOp::Ne),
        ] {
            let Command::Filter { op: parsed, .. } = parse1(&format!("filter age {text} 18"))
            else {
                panic!("expected Filter")
            };
            assert_eq!(parsed, op);
        }
    }

    #[test]
    fn where_is_filter_alias() {
        assert!(matches!(parse1("where age > 18"), Command::Filter { .. }));
    }

    #[test]
    fn filter_string_rhs_keeps_string() {
        let Command::Filter { rhs, .. } = parse1("filter country == \"Germany\"") else {
            panic!("expected Filter")
        };
        assert_eq!(rhs, RhsValue::Str("Germany".into()));
    }

    #[test]
    fn compound_and() {
        let Command::CompoundFilter { conds, logic } =
            parse1("filter age >= 18 and country == \"Germany\"")
        else {
            panic!("expected CompoundFilter")
        };
        assert_eq!(conds.len(), 2);
        assert_eq!(logic, vec![BoolOp::And]);
    }

    #[test]
    fn compound_or() {
        let Command::CompoundFilter { logic, .. } = parse1("filter salary == 0 or age < 18")
        else {
            panic!("expected CompoundFilter")
        };
        assert_eq!(logic, vec![BoolOp::Or]);
    }

    #[test]
    fn compound_multiple() {
        let Command::CompoundFilter { conds, logic } = parse1("filter a > 1 and b < 2 or c == 3")
        else {
            panic!("expected CompoundFilter")
        };
        assert_eq!(conds.len(), 3);
        assert_eq!(logic, vec![BoolOp::And, BoolOp::Or]);
    }

    #[test]
    fn quoted_and_is_not_a_combinator() {
        let Command::Filter { col, op, rhs } =
            parse1("filter company == \"Procter and Gamble\"")
        else {
            panic!("expected Filter")
        };
        assert_eq!(col, "company");
        assert_eq!(op, CmpOp::Eq);
        assert_eq!(rhs, RhsValue::Str("Procter and Gamble".into()));
    }

    #[test]
    fn quoted_or_is_not_a_combinator() {
        let Command::Filter { rhs, .. } = parse1("filter status == 'on or off'") else {
            panic!("expected Filter")
        };
        assert_eq!(rhs, RhsValue::Str("on or off".into()));
    }

    #[test]
    fn compound_with_quoted_and_in_rhs() {
        let Command::CompoundFilter { conds, logic } =
            parse1("filter company == \"Procter and Gamble\" and age > 0")
        else {
            panic!("expected CompoundFilter")
        };
        assert_eq!(conds.len(), 2);
        assert_eq!(logic, vec![BoolOp::And]);
        assert_eq!(conds[0].2, RhsValue::Str("Procter and Gamble".into()));
        assert_eq!(conds[1].0, "age");
    }

    #[test]
    fn filter_missing_condition_is_syntax_error() {
        assert!(parse(&["filter"]).is_err());
    }

    // -- projection ---------------------------------------------------------

    #[test]
    fn select_columns() {
        assert_eq!(
            parse1("select name, age, salary"),
            Command::Select {
                cols: vec!["name".into(), "age".into(), "salary".into()]
            }
        );
    }

    #[test]
    fn select_empty_is_syntax_error() {
        assert!(parse(&["select"]).is_err());
    }

    #[test]
    fn drop_columns() {
        assert_eq!(
            parse1("drop salary, country"),
            Command::Drop {
                cols: vec!["salary".into(), "country".into()]
            }
        );
    }

    #[test]
    fn limit_basic() {
        assert_eq!(parse1("limit 100"), Command::Limit { n: 100 });
    }

    #[test]
    fn limit_rejects_negative_and_non_integer() {
        assert!(parse(&["limit -5"]).is_err());
        assert!(parse(&["limit abc"]).is_err());
    }

    #[test]
    fn distinct_basic() {
        assert_eq!(parse1("distinct"), Command::Distinct);
    }

    #[test]
    fn sample_absolute() {
        assert_eq!(
            parse1("sample 50"),
            Command::Sample {
                n: Some(50),
                pct: None
            }
        );
    }

    #[test]
    fn sample_percentage() {
        assert_eq!(
            parse1("sample 10%"),
            Command::Sample {
                n: None,
                pct: Some(10.0)
            }
        );
    }

    #[test]
    fn sample_invalid_pct_is_syntax_error() {
        assert!(parse(&["sample 200%"]).is_err());
        assert!(parse(&["sample 0%"]).is_err());
    }

    // -- transforms ---------------------------------------------------------

    #[test]
    fn sort_single_default_asc() {
        assert_eq!(
            parse1("sort by age"),
            Command::Sort {
                cols: vec!["age".into()],
                ascending: vec![true]
            }
        );
    }

    #[test]
    fn sort_desc() {
        let Command::Sort { ascending, .. } = parse1("sort by salary desc") else {
            panic!("expected Sort")
        };
        assert_eq!(ascending, vec![false]);
    }

    #[test]
    fn sort_multi_column() {
        assert_eq!(
            parse1("sort by country asc, salary desc"),
            Command::Sort {
                cols: vec!["country".into(), "salary".into()],
                ascending: vec![true, false]
            }
        );
    }

    #[test]
    fn sort_invalid_direction_is_syntax_error() {
        assert!(parse(&["sort by age sideways"]).is_err());
        assert!(parse(&["sort age"]).is_err());
    }

    #[test]
    fn rename_basic() {
        assert_eq!(
            parse1("rename salary income"),
            Command::Rename {
                old: "salary".into(),
                new: "income".into()
            }
        );
    }

    #[test]
    fn rename_wrong_arity_is_syntax_error() {
        assert!(parse(&["rename a"]).is_err());
    }

    #[test]
    fn add_arithmetic() {
        assert_eq!(
            parse1("add tax = salary * 0.2"),
            Command::Add {
                col: "tax".into(),
                expr: "salary * 0.2".into()
            }
        );
    }

    #[test]
    fn add_if_then_else_dispatches_to_addif() {
        let Command::AddIf {
            col,
            cond_col,
            cond_op,
            true_val,
            false_val,
            ..
        } = parse1("add tier = if salary > 80000 then \"senior\" else \"junior\"")
        else {
            panic!("expected AddIf")
        };
        assert_eq!(col, "tier");
        assert_eq!(cond_col, "salary");
        assert_eq!(cond_op, CmpOp::Gt);
        assert_eq!(true_val, "\"senior\"");
        assert_eq!(false_val, "\"junior\"");
    }

    #[test]
    fn add_missing_equals_is_syntax_error() {
        assert!(parse(&["add tax salary"]).is_err());
    }

    #[test]
    fn string_transforms() {
        assert_eq!(parse1("trim country"), Command::Trim { col: "country".into() });
        assert_eq!(
            parse1("uppercase name"),
            Command::Uppercase { col: "name".into() }
        );
        assert_eq!(
            parse1("lowercase name"),
            Command::Lowercase { col: "name".into() }
        );
    }

    #[test]
    fn cast_basic() {
        assert_eq!(
            parse1("cast age int"),
            Command::Cast {
                col: "age".into(),
                type_name: "int".into()
            }
        );
    }

    #[test]
    fn cast_missing_type_is_syntax_error() {
        assert!(parse(&["cast age"]).is_err());
    }

    #[test]
    fn replace_basic() {
        assert_eq!(
            parse1("replace country \"Germany\" \"DE\""),
            Command::Replace {
                col: "country".into(),
                old: "Germany".into(),
                new: "DE".into()
            }
        );
    }

    #[test]
    fn pivot_basic() {
        assert_eq!(
            parse1("pivot index=country column=year value=revenue"),
            Command::Pivot {
                index: "country".into(),
                column: "year".into(),
                value: "revenue".into()
            }
        );
    }

    #[test]
    fn pivot_missing_key_is_syntax_error() {
        assert!(parse(&["pivot index=country column=year"]).is_err());
    }

    // -- grouping & aggregation ---------------------------------------------

    #[test]
    fn group_by_single() {
        assert_eq!(
            parse1("group by country"),
            Command::GroupBy {
                cols: vec!["country".into()]
            }
        );
    }

    #[test]
    fn group_by_multi() {
        assert_eq!(
            parse1("group by country, age"),
            Command::GroupBy {
                cols: vec!["country".into(), "age".into()]
            }
        );
    }

    #[test]
    fn group_missing_by_is_syntax_error() {
        assert!(parse(&["group country"]).is_err());
    }

    #[test]
    fn single_column_aggregations() {
        assert_eq!(parse1("sum salary"), Command::Sum { col: "salary".into() });
        assert_eq!(parse1("avg salary"), Command::Avg { col: "salary".into() });
        assert_eq!(parse1("min age"), Command::Min { col: "age".into() });
        assert_eq!(parse1("max age"), Command::Max { col: "age".into() });
    }

    #[test]
    fn count_no_args() {
        assert_eq!(parse1("count"), Command::Count);
    }

    #[test]
    fn count_if_condition() {
        let Command::CountIf { col, op, rhs } = parse1("count if salary > 50000") else {
            panic!("expected CountIf")
        };
        assert_eq!(col, "salary");
        assert_eq!(op, CmpOp::Gt);
        assert_eq!(rhs, RhsValue::Number(50000.0));
    }

    #[test]
    fn multi_agg() {
        let Command::MultiAgg { specs } = parse1("agg sum salary, avg age, count") else {
            panic!("expected MultiAgg")
        };
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].verb, AggVerb::Sum);
        assert_eq!(specs[0].col.as_deref(), Some("salary"));
        assert_eq!(specs[2].verb, AggVerb::Count);
        assert_eq!(specs[2].col, None);
    }

    #[test]
    fn agg_empty_is_syntax_error() {
        assert!(parse(&["agg"]).is_err());
    }

    // -- joining ------------------------------------------------------------

    #[test]
    fn join_defaults_to_inner() {
        assert_eq!(
            parse1("join \"lookup.csv\" on id"),
            Command::Join {
                path: "lookup.csv".into(),
                key: "id".into(),
                how: JoinHow::Inner
            }
        );
    }

    #[test]
    fn join_explicit_types() {
        for (text, how) in [
            ("left", JoinHow::Left),
            ("right", JoinHow::Right),
            ("outer", JoinHow::Outer),
            ("inner", JoinHow::Inner),
        ] {
            let Command::Join { how: parsed, .. } =
                parse1(&format!("join \"lookup.csv\" on id {text}"))
            else {
                panic!("expected Join")
            };
            assert_eq!(parsed, how);
        }
    }

    #[test]
    fn join_invalid_how_is_syntax_error() {
        let err = parse(&["join \"f.csv\" on id cross"]).unwrap_err();
        assert!(err.to_string().contains("join type"));
    }

    #[test]
    fn join_missing_on_is_syntax_error() {
        assert!(parse(&["join \"f.csv\" id"]).is_err());
    }

    #[test]
    fn join_missing_path_is_syntax_error() {
        assert!(parse(&["join on id"]).is_err());
    }

    #[test]
    fn merge_basic() {
        assert_eq!(
            parse1("merge \"extra.csv\""),
            Command::Merge {
                path: "extra.csv".into()
            }
        );
    }

    // -- output -------------------------------------------------------------

    #[test]
    fn save_paths() {
        for path in ["output/result.csv", "output/result.json", "output/result.parquet"] {
            assert_eq!(
                parse1(&format!("save \"{path}\"")),
                Command::Save { path: path.into() }
            );
        }
    }

    #[test]
    fn no_arg_outputs() {
        assert_eq!(parse1("print"), Command::Print);
        assert_eq!(parse1("schema"), Command::Schema);
        assert_eq!(parse1("inspect"), Command::Inspect);
    }

    #[test]
    fn head_basic() {
        assert_eq!(parse1("head 10"), Command::Head { n: 10 });
    }

    #[test]
    fn log_basic() {
        assert_eq!(
            parse1("log \"Processing complete\""),
            Command::Log {
                message: "Processing complete".into()
            }
        );
    }

    #[test]
    fn timer_actions() {
        assert_eq!(
            parse1("timer start load"),
            Command::Timer {
                action: TimerAction::Start,
                label: "load".into()
            }
        );
        assert_eq!(
            parse1("timer lap load"),
            Command::Timer {
                action: TimerAction::Lap,
                label: "load".into()
            }
        );
        assert_eq!(
            parse1("timer stop load"),
            Command::Timer {
                action: TimerAction::Stop,
                label: "load".into()
            }
        );
    }

    #[test]
    fn timer_bad_action_is_syntax_error() {
        assert!(parse(&["timer pause load"]).is_err());
    }

    // -- quality & variables ------------------------------------------------

    #[test]
    fn assert_basic() {
        let Command::Assert { op, .. } = parse1("assert age > 0") else {
            panic!("expected Assert")
        };
        assert_eq!(op, CmpOp::Gt);
    }

    #[test]
    fn fill_named_strategies() {
        for (text, strategy) in [
            ("mean", FillStrategy::Mean),
            ("median", FillStrategy::Median),
            ("mode", FillStrategy::Mode),
            ("forward", FillStrategy::Forward),
            ("backward", FillStrategy::Backward),
            ("drop", FillStrategy::Drop),
        ] {
            let Command::Fill { strategy: parsed, .. } = parse1(&format!("fill salary {text}"))
            else {
                panic!("expected Fill")
            };
            assert_eq!(parsed, strategy);
        }
    }

    #[test]
    fn fill_literal_value() {
        let Command::Fill { strategy, .. } = parse1("fill country \"Unknown\"") else {
            panic!("expected Fill")
        };
        assert_eq!(strategy, FillStrategy::Literal("Unknown".into()));
    }

    #[test]
    fn set_basic() {
        assert_eq!(
            parse1("set threshold = 50000"),
            Command::Set {
                name: "threshold".into(),
                value: "50000".into()
            }
        );
    }

    #[test]
    fn set_strips_quotes() {
        let Command::Set { value, .. } = parse1("set label = \"hello\"") else {
            panic!("expected Set")
        };
        assert_eq!(value, "hello");
    }

    #[test]
    fn set_missing_equals_is_syntax_error() {
        assert!(parse(&["set threshold 50000"]).is_err());
    }

    #[test]
    fn env_basic() {
        assert_eq!(
            parse1("env DATA_PATH"),
            Command::Env {
                var_name: "DATA_PATH".into()
            }
        );
    }

    // -- try / on_error -----------------------------------------------------

    #[test]
    fn try_skip() {
        let cmds = parse(&["try", "cast age int", "on_error skip"]).unwrap();
        assert_eq!(cmds.len(), 1);
        let Command::Try { body, on_error } = &cmds[0] else {
            panic!("expected Try")
        };
        assert_eq!(body.len(), 1);
        assert_eq!(*on_error, HandlerSpec::Skip);
    }

    #[test]
    fn try_log_handler() {
        let cmds = parse(&["try", "assert age > 200", "on_error log \"bad data\""]).unwrap();
        let Command::Try { on_error, .. } = &cmds[0] else {
            panic!("expected Try")
        };
        assert_eq!(*on_error, HandlerSpec::Log("bad data".into()));
    }

    #[test]
    fn try_command_handler() {
        let cmds = parse(&["try", "cast age int", "on_error fill age 0"]).unwrap();
        let Command::Try { on_error, .. } = &cmds[0] else {
            panic!("expected Try")
        };
        let HandlerSpec::Run(handlers) = on_error else {
            panic!("expected Run handler")
        };
        assert_eq!(handlers.len(), 1);
        assert!(matches!(handlers[0], Command::Fill { .. }));
    }

    #[test]
    fn try_multi_line_body() {
        let cmds = parse(&["try", "cast age int", "filter age > 0", "on_error skip"]).unwrap();
        let Command::Try { body, .. } = &cmds[0] else {
            panic!("expected Try")
        };
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn try_followed_by_more_commands() {
        let cmds = parse(&["try", "cast age int", "on_error skip", "select name"]).unwrap();
        assert_eq!(cmds.len(), 2);
        assert!(matches!(cmds[0], Command::Try { .. }));
        assert!(matches!(cmds[1], Command::Select { .. }));
    }

    #[test]
    fn nested_try_blocks() {
        let cmds = parse(&[
            "try",
            "try",
            "assert salary > 1000000",
            "on_error skip",
            "on_error skip",
        ])
        .unwrap();
        assert_eq!(cmds.len(), 1);
        let Command::Try { body, .. } = &cmds[0] else {
            panic!("expected Try")
        };
        assert_eq!(body.len(), 1);
        assert!(matches!(body[0], Command::Try { .. }));
    }

    #[test]
    fn try_missing_on_error_is_syntax_error() {
        let err = parse(&["try", "cast age int"]).unwrap_err();
        assert!(err.to_string().contains("on_error"));
    }

    #[test]
    fn empty_on_error_action_is_syntax_error() {
        assert!(parse(&["try", "cast age int", "on_error"]).is_err());
    }

    #[test]
    fn try_case_insensitive() {
        let cmds = parse(&["TRY", "cast age int", "on_error skip"]).unwrap();
        assert!(matches!(cmds[0], Command::Try { .. }));
    }

    #[test]
    fn orphan_on_error_is_syntax_error() {
        let err = parse(&["on_error skip"]).unwrap_err();
        assert!(err.to_string().contains("without matching 'try'"));
    }

    // -- datetime -----------------------------------------------------------

    #[test]
    fn parse_date_basic() {
        assert_eq!(
            parse1("parse_date signup \"%Y-%m-%d\""),
            Command::ParseDate {
                col: "signup".into(),
                format: "%Y-%m-%d".into()
            }
        );
    }

    #[test]
    fn extract_basic() {
        assert_eq!(
            parse1("extract year signup signup_year"),
            Command::Extract {
                part: DatePart::Year,
                col: "signup".into(),
                new_col: "signup_year".into()
            }
        );
    }

    #[test]
    fn extract_bad_part_is_syntax_error() {
        assert!(parse(&["extract century signup c"]).is_err());
    }

    #[test]
    fn date_diff_basic() {
        assert_eq!(
            parse1("date_diff shipped ordered lead_time days"),
            Command::DateDiff {
                col1: "shipped".into(),
                col2: "ordered".into(),
                new_col: "lead_time".into(),
                unit: DiffUnit::Days
            }
        );
    }

    #[test]
    fn filter_date_basic() {
        assert_eq!(
            parse1("filter_date signup >= 2023-01-01"),
            Command::FilterDate {
                col: "signup".into(),
                op: CmpOp::Ge,
                iso_date: "2023-01-01".into()
            }
        );
    }

    #[test]
    fn truncate_date_basic() {
        assert_eq!(
            parse1("truncate_date ts month"),
            Command::TruncateDate {
                col: "ts".into(),
                unit: TruncUnit::Month
            }
        );
    }

    #[test]
    fn ts_sort_basic() {
        assert_eq!(parse1("ts_sort ts"), Command::TsSort { col: "ts".into() });
    }

    // -- errors -------------------------------------------------------------

    #[test]
    fn unknown_command_lists_supported() {
        let err = parse(&["foobar arg"]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unknown command 'foobar'"));
        assert!(msg.contains("Supported commands"));
    }

    #[test]
    fn errors_carry_line_numbers() {
        let err = parse(&["print", "limit abc"]).unwrap_err();
        assert!(err.to_string().starts_with("Line 2:"));
    }
}
