//! SQL lowerer (spec §4.5 — component C6).
//!
//! Lowers a (typically already-[`crate::simplify::simplify`]d) [`Expression`]
//! into the dialect-neutral [`Predicate`] tree, resolving field operands via
//! [`crate::resolve::resolve_field_path`] and dispatching join-graph-bearing
//! predicates to either the flag-CTE collector or an `EXISTS` subquery,
//! selected by [`LoweringMode`] (spec §9 Open Question 1).

use crate::ast::{normalize_field, CompareOp, ComparisonKind, Expression, FieldRef, StringOp, StringValue, Value};
use crate::error::{Error, Result};
use crate::path::ArrayIndex;
use crate::resolve::resolve_field_path;

use super::ast::{ParamValue, Predicate, SqlExpr};
use super::collector::Collector;
use super::match_compiler;

/// Selects between the flag-CTE lowering path and the legacy EXISTS-subquery
/// path (spec §9 Open Question 1: "keep both behind a single dispatcher").
/// New call sites should prefer `FlagCte`; `Exists` is kept for call sites
/// not yet migrated to a shared collector.
pub enum LoweringMode<'a> {
    FlagCte(&'a mut Collector),
    // TODO(migrate-cte): drop this variant once every caller supplies a
    // Collector; tracked as a standing follow-up, not exercised by default.
    Exists,
}

/// Lower a boolean expression tree into the dialect-neutral predicate tree.
pub fn lower(expr: &Expression, mode: &mut LoweringMode, warnings: &mut Vec<String>) -> Result<Predicate> {
    match expr {
        Expression::Boolean(b) => Ok(Predicate::Boolean(*b)),
        Expression::And(children) => {
            let lowered = children
                .iter()
                .map(|c| lower(c, mode, warnings))
                .collect::<Result<Vec<_>>>()?;
            Ok(Predicate::And(lowered))
        }
        Expression::Or(children) => {
            let lowered = children
                .iter()
                .map(|c| lower(c, mode, warnings))
                .collect::<Result<Vec<_>>>()?;
            Ok(Predicate::Or(lowered))
        }
        Expression::Not(inner) => Ok(Predicate::Not(Box::new(lower(inner, mode, warnings)?))),
        Expression::Match(children) => match_compiler::lower_match(children, mode, warnings),
        _ => {
            if let Some((op, a, b)) = expr.as_compare() {
                lower_compare(op, a, b, mode, warnings)
            } else if let Some((op, a, b)) = expr.as_string_op() {
                lower_string_op(op, a, b, mode, warnings)
            } else {
                unreachable!("every Expression variant is Boolean, And, Or, Not, Match, a compare, or a string op")
            }
        }
    }
}

pub(super) fn unwrap_field(v: &Value) -> Option<(&FieldRef, Option<ComparisonKind>)> {
    match v {
        Value::Field(f) => Some((f, None)),
        Value::StrCast(inner) => inner.as_field().map(|f| (f, Some(ComparisonKind::String))),
        Value::NumCast(inner) => inner.as_field().map(|f| (f, Some(ComparisonKind::Number))),
        Value::BoolCast(inner) => inner.as_field().map(|f| (f, Some(ComparisonKind::Bool))),
        Value::TimeCast(inner) => inner.as_field().map(|f| (f, Some(ComparisonKind::Time))),
        Value::DateTimeCast(inner) => inner.as_field().map(|f| (f, Some(ComparisonKind::DateTime))),
        Value::HexCast(inner) => inner.as_field().map(|f| (f, Some(ComparisonKind::Hex))),
        _ => None,
    }
}

/// `(sql_type, guarded)` for an *implicit* cast of a bare field to match the
/// other operand's kind (spec §4.5 step 2): Number/Bool/Time/DateTime guard
/// with a regex-checked `CASE WHEN`; String/Hex cast bare.
fn implicit_cast_sql_type(kind: ComparisonKind) -> Option<(&'static str, bool)> {
    match kind {
        ComparisonKind::Number => Some(("double precision", true)),
        ComparisonKind::Bool => Some(("boolean", true)),
        ComparisonKind::Time => Some(("time", true)),
        ComparisonKind::DateTime => Some(("timestamptz", true)),
        ComparisonKind::String => Some(("text", false)),
        ComparisonKind::Hex => Some(("text", false)),
        ComparisonKind::Field | ComparisonKind::Unknown => None,
    }
}

/// `(sql_type, guarded)` for an *explicit* cast wrapper: every target kind
/// guards except `$strCast`, which emits bare `::text` (spec §4.5 step 2).
fn explicit_cast_sql_type(kind: ComparisonKind) -> (&'static str, bool) {
    match kind {
        ComparisonKind::String => ("text", false),
        ComparisonKind::Number => ("double precision", true),
        ComparisonKind::Bool => ("boolean", true),
        ComparisonKind::Time => ("time", true),
        ComparisonKind::DateTime => ("timestamptz", true),
        ComparisonKind::Hex => ("text", true),
        ComparisonKind::Field | ComparisonKind::Unknown => ("text", false),
    }
}

fn build_column_expr(column: &str, explicit_cast: Option<ComparisonKind>, other_kind: ComparisonKind) -> SqlExpr {
    let base = SqlExpr::Column(column.to_string());
    if let Some(kind) = explicit_cast {
        let (sql_type, guarded) = explicit_cast_sql_type(kind);
        return SqlExpr::Cast {
            inner: Box::new(base),
            sql_type,
            guarded,
        };
    }
    match implicit_cast_sql_type(other_kind) {
        Some((sql_type, guarded)) => SqlExpr::Cast {
            inner: Box::new(base),
            sql_type,
            guarded,
        },
        None => base,
    }
}

fn literal_to_sql_expr(v: &Value) -> Result<SqlExpr> {
    match v.strip_casts() {
        Value::StrVal(s) => Ok(SqlExpr::Param(ParamValue::Str(s.clone()))),
        Value::NumVal(n) => Ok(SqlExpr::Param(ParamValue::Float(*n))),
        Value::Boolean(b) => Ok(SqlExpr::Param(ParamValue::Bool(*b))),
        Value::HexVal(h) => Ok(SqlExpr::Param(ParamValue::Str(format!("16#{}", h.0)))),
        Value::DateTimeVal(d) => Ok(SqlExpr::Param(ParamValue::DateTime(d.0))),
        Value::TimeVal(t) => Ok(SqlExpr::Param(ParamValue::Time(t.0))),
        Value::Year(y) => Ok(SqlExpr::Param(ParamValue::Int(*y as i64))),
        Value::Month(m) | Value::DayOfMonth(m) | Value::DayOfWeek(m) => Ok(SqlExpr::Param(ParamValue::Int(*m as i64))),
        Value::Attribute(a) => Err(Error::resolver(format!(
            "unresolved attribute {a:?} reached the SQL lowerer; run simplify first"
        ))),
        other => Err(Error::type_mismatch(format!("{other:?} cannot be lowered to a SQL literal"))),
    }
}

/// Conjoin the `idshort_path = ?` binding spec §4.4 requires for the
/// `$sme.<idShortPath>#…` root form (it pins the match to the submodel
/// element at that path, not just its own terminal column). Applied before
/// dispatch so it's folded into the predicate whether dispatch sends it
/// through a collector, an `EXISTS` wrap, or returns it inline.
fn with_id_short_path_binding(resolved: &crate::resolve::ResolvedFieldPath, predicate: Predicate) -> Predicate {
    match &resolved.id_short_path {
        Some(path) => {
            let id_short_path_predicate = Predicate::Compare {
                op: CompareOp::Eq,
                left: SqlExpr::Column("submodel_element.idshort_path".to_string()),
                right: SqlExpr::Param(ParamValue::Str(path.clone())),
            };
            Predicate::And(vec![id_short_path_predicate, predicate])
        }
        None => predicate,
    }
}

fn position_predicates(resolved: &crate::resolve::ResolvedFieldPath) -> Vec<Predicate> {
    resolved
        .array_bindings
        .iter()
        .filter_map(|b| match b.index {
            ArrayIndex::Int(n) => Some(Predicate::Compare {
                op: CompareOp::Eq,
                left: SqlExpr::Column(b.position_column.clone()),
                right: SqlExpr::Param(ParamValue::Int(n as i64)),
            }),
            ArrayIndex::Wildcard => None,
        })
        .collect()
}

fn lower_to_exists(resolved: crate::resolve::ResolvedFieldPath, predicate: Predicate) -> Predicate {
    let mut where_parts = position_predicates(&resolved);
    let mut joins = resolved.joins;
    let base = joins.remove(0);
    where_parts.push(predicate);
    let where_predicate = if where_parts.len() == 1 {
        where_parts.into_iter().next().unwrap()
    } else {
        Predicate::And(where_parts)
    };
    Predicate::Exists {
        base,
        joins,
        where_predicate: Box::new(where_predicate),
    }
}

/// Dispatch a field-bearing predicate to the collector or EXISTS, per spec
/// §4.5 step 3. A path with no joins resolves entirely against the outer
/// query's own base tables and is returned inline.
fn dispatch(
    resolved: crate::resolve::ResolvedFieldPath,
    predicate: Predicate,
    mode: &mut LoweringMode,
) -> Result<Predicate> {
    if resolved.joins.is_empty() {
        return Ok(predicate);
    }
    match mode {
        LoweringMode::FlagCte(collector) => Ok(collector.register(resolved.joins, &resolved.array_bindings, predicate)),
        LoweringMode::Exists => Ok(lower_to_exists(resolved, predicate)),
    }
}

/// Build the `Predicate::Compare` for a comparison, resolving whichever
/// operand is a field. Returns the resolved path alongside it so the caller
/// can decide how to dispatch (a collector registration, an `EXISTS` wrap, or
/// — for `$match` children — neither, since the CTE's own join chain already
/// covers it).
pub(super) fn build_compare(
    op: CompareOp,
    a: &Value,
    b: &Value,
) -> Result<(Predicate, Option<crate::resolve::ResolvedFieldPath>)> {
    let a_field = unwrap_field(a);
    let b_field = unwrap_field(b);

    if a_field.is_none() && b_field.is_none() {
        return Ok((
            Predicate::Compare {
                op,
                left: literal_to_sql_expr(a)?,
                right: literal_to_sql_expr(b)?,
            },
            None,
        ));
    }
    if a_field.is_some() && b_field.is_some() {
        return Err(Error::unsupported_field(
            "comparing two unresolved field references directly is not supported",
        ));
    }

    let (field, explicit_cast, other, field_is_left) = match a_field {
        Some((f, c)) => (f, c, b, true),
        None => {
            let (f, c) = b_field.unwrap();
            (f, c, a, false)
        }
    };

    let resolved = resolve_field_path(&normalize_field(&field.0)?)?;
    log::debug!("resolved field {:?} -> {}", field.0, resolved.column);
    let column_expr = build_column_expr(&resolved.column, explicit_cast, other.kind());
    let literal_expr = literal_to_sql_expr(other)?;
    let (left, right) = if field_is_left {
        (column_expr, literal_expr)
    } else {
        (literal_expr, column_expr)
    };
    let predicate = with_id_short_path_binding(&resolved, Predicate::Compare { op, left, right });

    Ok((predicate, Some(resolved)))
}

fn lower_compare(
    op: CompareOp,
    a: &Value,
    b: &Value,
    mode: &mut LoweringMode,
    _warnings: &mut [String],
) -> Result<Predicate> {
    let (predicate, resolved) = build_compare(op, a, b)?;
    match resolved {
        Some(r) => dispatch(r, predicate, mode),
        None => Ok(predicate),
    }
}

pub(super) fn string_value_field(v: &StringValue) -> Option<(&FieldRef, Option<ComparisonKind>)> {
    match v {
        StringValue::Field(f) => Some((f, None)),
        StringValue::StrCast(inner) => inner.as_field().map(|f| (f, Some(ComparisonKind::String))),
        _ => None,
    }
}

fn string_value_literal(v: &StringValue) -> Result<String> {
    match v {
        StringValue::StrVal(s) => Ok(s.clone()),
        StringValue::StrCast(inner) => match literal_to_sql_expr(inner)? {
            SqlExpr::Param(ParamValue::Str(s)) => Ok(s),
            _ => Err(Error::type_mismatch("cast did not resolve to a string literal")),
        },
        StringValue::Field(_) => Err(Error::type_mismatch("field operand is not a literal")),
        StringValue::Attribute(a) => Err(Error::resolver(format!(
            "unresolved attribute {a:?} reached the SQL lowerer; run simplify first"
        ))),
    }
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn evaluate_string_op_literal(op: StringOp, haystack: &str, needle: &str) -> Result<bool> {
    match op {
        StringOp::Contains => Ok(haystack.contains(needle)),
        StringOp::StartsWith => Ok(haystack.starts_with(needle)),
        StringOp::EndsWith => Ok(haystack.ends_with(needle)),
        StringOp::Regex => {
            let re = regex::Regex::new(needle).map_err(|e| Error::parse(format!("invalid regex {needle:?}: {e}")))?;
            Ok(re.is_match(haystack))
        }
    }
}

/// Build the `Predicate` for a string operator, resolving the field operand
/// (always `a`; the pattern `b` must be a literal). Mirrors [`build_compare`]
/// in returning the resolved path for the caller to dispatch.
pub(super) fn build_string_op(
    op: StringOp,
    a: &StringValue,
    b: &StringValue,
) -> Result<(Predicate, Option<crate::resolve::ResolvedFieldPath>)> {
    let a_field = string_value_field(a);
    let b_field = string_value_field(b);

    if a_field.is_none() && b_field.is_none() {
        let haystack = string_value_literal(a)?;
        let needle = string_value_literal(b)?;
        let result = evaluate_string_op_literal(op, &haystack, &needle)?;
        return Ok((Predicate::Boolean(result), None));
    }
    if b_field.is_some() {
        return Err(Error::unsupported_field(
            "the pattern operand of a string operator must be a literal",
        ));
    }

    let (field, explicit_cast) = a_field.unwrap();
    let needle = string_value_literal(b)?;
    let resolved = resolve_field_path(&normalize_field(&field.0)?)?;
    let column_expr = build_column_expr(&resolved.column, explicit_cast.or(Some(ComparisonKind::String)), ComparisonKind::String);

    let predicate = match op {
        StringOp::Regex => Predicate::Regex {
            column: column_expr,
            pattern: ParamValue::Str(needle),
        },
        StringOp::Contains => Predicate::Like {
            column: column_expr,
            pattern: ParamValue::Str(format!("%{}%", escape_like(&needle))),
        },
        StringOp::StartsWith => Predicate::Like {
            column: column_expr,
            pattern: ParamValue::Str(format!("{}%", escape_like(&needle))),
        },
        StringOp::EndsWith => Predicate::Like {
            column: column_expr,
            pattern: ParamValue::Str(format!("%{}", escape_like(&needle))),
        },
    };
    let predicate = with_id_short_path_binding(&resolved, predicate);

    Ok((predicate, Some(resolved)))
}

fn lower_string_op(
    op: StringOp,
    a: &StringValue,
    b: &StringValue,
    mode: &mut LoweringMode,
    _warnings: &mut [String],
) -> Result<Predicate> {
    let (predicate, resolved) = build_string_op(op, a, b)?;
    match resolved {
        Some(r) => dispatch(r, predicate, mode),
        None => Ok(predicate),
    }
}
