//! Partial evaluator (spec §4.3 — component C5).

pub mod attribute;

pub use attribute::{promote, AttributeResolver, AttributeValue};

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, NaiveTime};

use crate::ast::{CompareOp, ComparisonKind, Expression, HexValue, StringOp, StringValue, Value};
use crate::error::{Error, Result};

/// Tri-state simplification outcome (spec §4.3, SPEC_FULL §B.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    True,
    False,
    Undecided,
}

impl Decision {
    pub fn from_bool(b: bool) -> Decision {
        if b {
            Decision::True
        } else {
            Decision::False
        }
    }
}

/// `simplify(E, Φ) → (E′, decision)` (spec §4.3). Recurses bottom-up;
/// idempotent on its own output (spec §8) because a fully-substituted,
/// deduped tree simplifies to itself on a second pass.
pub fn simplify(expr: &Expression, resolver: &dyn AttributeResolver) -> Result<(Expression, Decision)> {
    match expr {
        Expression::Boolean(b) => Ok((Expression::Boolean(*b), Decision::from_bool(*b))),

        Expression::And(children) => simplify_and(children, resolver),
        Expression::Or(children) => simplify_or(children, resolver),

        Expression::Not(inner) => {
            let (inner, decision) = simplify(inner, resolver)?;
            match decision {
                Decision::True => Ok((Expression::Boolean(false), Decision::False)),
                Decision::False => Ok((Expression::Boolean(true), Decision::True)),
                Decision::Undecided => Ok((Expression::Not(Box::new(inner)), Decision::Undecided)),
            }
        }

        // $match's truth depends on row co-occurrence that only the SQL/
        // descriptor layers can observe (spec §4.6, §4.7); the partial
        // evaluator still folds constants inside each child but always
        // leaves the group itself Undecided.
        Expression::Match(children) => {
            let mut folded = Vec::with_capacity(children.len());
            for child in children {
                let (child, _) = simplify(child, resolver)?;
                folded.push(child);
            }
            Ok((Expression::Match(folded), Decision::Undecided))
        }

        _ => {
            if let Some((op, a, b)) = expr.as_compare() {
                simplify_compare(op, a, b, resolver)
            } else if let Some((op, a, b)) = expr.as_string_op() {
                simplify_string_op(op, a, b, resolver)
            } else {
                unreachable!("every Expression variant is Boolean, And, Or, Not, Match, a compare, or a string op")
            }
        }
    }
}

fn simplify_and(children: &[Expression], resolver: &dyn AttributeResolver) -> Result<(Expression, Decision)> {
    let mut survivors = Vec::new();
    let mut seen = HashSet::new();
    for child in children {
        let (child, decision) = simplify(child, resolver)?;
        match decision {
            Decision::False => return Ok((Expression::Boolean(false), Decision::False)),
            Decision::True => continue,
            Decision::Undecided => {
                if seen.insert(child.canonical_key()) {
                    survivors.push(child);
                }
            }
        }
    }
    match survivors.len() {
        0 => Ok((Expression::Boolean(true), Decision::True)),
        1 => Ok((survivors.into_iter().next().unwrap(), Decision::Undecided)),
        _ => Ok((Expression::And(survivors), Decision::Undecided)),
    }
}

fn simplify_or(children: &[Expression], resolver: &dyn AttributeResolver) -> Result<(Expression, Decision)> {
    let mut survivors = Vec::new();
    let mut seen = HashSet::new();
    for child in children {
        let (child, decision) = simplify(child, resolver)?;
        match decision {
            Decision::True => return Ok((Expression::Boolean(true), Decision::True)),
            Decision::False => continue,
            Decision::Undecided => {
                if seen.insert(child.canonical_key()) {
                    survivors.push(child);
                }
            }
        }
    }
    match survivors.len() {
        0 => Ok((Expression::Boolean(false), Decision::False)),
        1 => Ok((survivors.into_iter().next().unwrap(), Decision::Undecided)),
        _ => Ok((Expression::Or(survivors), Decision::Undecided)),
    }
}

fn substitute_attributes(v: &Value, resolver: &dyn AttributeResolver) -> Result<Value> {
    match v {
        Value::Attribute(a) => promote(resolver, a),
        Value::StrCast(inner) => Ok(Value::StrCast(Box::new(substitute_attributes(inner, resolver)?))),
        Value::NumCast(inner) => Ok(Value::NumCast(Box::new(substitute_attributes(inner, resolver)?))),
        Value::BoolCast(inner) => Ok(Value::BoolCast(Box::new(substitute_attributes(inner, resolver)?))),
        Value::TimeCast(inner) => Ok(Value::TimeCast(Box::new(substitute_attributes(inner, resolver)?))),
        Value::DateTimeCast(inner) => Ok(Value::DateTimeCast(Box::new(substitute_attributes(inner, resolver)?))),
        Value::HexCast(inner) => Ok(Value::HexCast(Box::new(substitute_attributes(inner, resolver)?))),
        other => Ok(other.clone()),
    }
}

fn simplify_compare(
    op: CompareOp,
    a: &Value,
    b: &Value,
    resolver: &dyn AttributeResolver,
) -> Result<(Expression, Decision)> {
    let a = substitute_attributes(a, resolver)?;
    let b = substitute_attributes(b, resolver)?;

    if a.is_literal() && b.is_literal() {
        let kind = a.comparable_to(&b)?;
        let result = evaluate_compare(op, &a, &b, kind)?;
        return Ok((Expression::Boolean(result), Decision::from_bool(result)));
    }

    let kind = a.comparable_to(&b)?;
    let a = a.wrap_field_cast(kind);
    let b = b.wrap_field_cast(kind);
    Ok((rebuild_compare(op, a, b), Decision::Undecided))
}

fn rebuild_compare(op: CompareOp, a: Value, b: Value) -> Expression {
    match op {
        CompareOp::Eq => Expression::Eq(a, b),
        CompareOp::Ne => Expression::Ne(a, b),
        CompareOp::Gt => Expression::Gt(a, b),
        CompareOp::Ge => Expression::Ge(a, b),
        CompareOp::Lt => Expression::Lt(a, b),
        CompareOp::Le => Expression::Le(a, b),
    }
}

/// §7 `OperatorDomainError` fallback: an ordered comparison on String/Bool
/// operands is not an error at runtime, it simply evaluates to `false`.
///
/// `pub(crate)`: reused by [`crate::eval::descriptor`], which needs the same
/// kind-dispatched coercion rules against JSON-sourced leaf values instead of
/// resolved SQL columns.
pub(crate) fn evaluate_compare(op: CompareOp, a: &Value, b: &Value, kind: ComparisonKind) -> Result<bool> {
    if op.is_ordered() && matches!(kind, ComparisonKind::String | ComparisonKind::Bool) {
        log::warn!(
            "ordered comparison {} requested on {kind} operands; falling back to false",
            op.symbol()
        );
        return Ok(false);
    }
    match kind {
        ComparisonKind::String => {
            let (a, b) = (coerce_string(a)?, coerce_string(b)?);
            Ok(apply_ordering(op, a.cmp(&b)))
        }
        ComparisonKind::Bool => {
            let (a, b) = (coerce_bool(a)?, coerce_bool(b)?);
            Ok(apply_ordering(op, a.cmp(&b)))
        }
        ComparisonKind::Number => {
            let (a, b) = (coerce_number(a)?, coerce_number(b)?);
            let ord = a
                .partial_cmp(&b)
                .ok_or_else(|| Error::type_mismatch("cannot compare NaN"))?;
            Ok(apply_ordering(op, ord))
        }
        ComparisonKind::DateTime => {
            let (a, b) = (coerce_datetime(a)?, coerce_datetime(b)?);
            Ok(apply_ordering(op, a.cmp(&b)))
        }
        ComparisonKind::Time => {
            let (a, b) = (coerce_time(a)?, coerce_time(b)?);
            Ok(apply_ordering(op, a.cmp(&b)))
        }
        ComparisonKind::Hex => {
            let (a, b) = (coerce_hex(a)?, coerce_hex(b)?);
            Ok(apply_ordering(op, a.cmp(&b)))
        }
        ComparisonKind::Field | ComparisonKind::Unknown => Err(Error::type_mismatch(
            "comparison operands did not resolve to a concrete kind",
        )),
    }
}

fn apply_ordering(op: CompareOp, ord: Ordering) -> bool {
    match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Ne => ord != Ordering::Equal,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Ge => ord != Ordering::Less,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Le => ord != Ordering::Greater,
    }
}

fn coerce_string(v: &Value) -> Result<String> {
    match v.strip_casts() {
        Value::StrVal(s) => Ok(s.clone()),
        Value::NumVal(n) => Ok(n.to_string()),
        Value::Boolean(b) => Ok(b.to_string()),
        Value::HexVal(h) => Ok(format!("16#{}", h.0)),
        Value::DateTimeVal(d) => Ok(d.0.to_rfc3339()),
        Value::TimeVal(t) => Ok(t.0.format("%H:%M:%S").to_string()),
        Value::Year(y) => Ok(y.to_string()),
        Value::Month(m) | Value::DayOfMonth(m) | Value::DayOfWeek(m) => Ok(m.to_string()),
        other => Err(Error::type_mismatch(format!("{other:?} cannot be compared as String"))),
    }
}

fn coerce_bool(v: &Value) -> Result<bool> {
    match v.strip_casts() {
        Value::Boolean(b) => Ok(*b),
        Value::StrVal(s) => s
            .parse()
            .map_err(|_| Error::type_mismatch(format!("{s:?} is not a boolean literal"))),
        other => Err(Error::type_mismatch(format!("{other:?} cannot be compared as Bool"))),
    }
}

fn coerce_number(v: &Value) -> Result<f64> {
    match v.strip_casts() {
        Value::NumVal(n) => Ok(*n),
        Value::Year(y) => Ok(*y as f64),
        Value::Month(m) | Value::DayOfMonth(m) | Value::DayOfWeek(m) => Ok(*m as f64),
        Value::StrVal(s) => s
            .parse()
            .map_err(|_| Error::type_mismatch(format!("{s:?} is not numeric"))),
        Value::HexVal(h) => u128::from_str_radix(&h.0, 16)
            .map(|n| n as f64)
            .map_err(|_| Error::type_mismatch("hex literal does not fit a double for numeric comparison")),
        other => Err(Error::type_mismatch(format!("{other:?} cannot be compared as Number"))),
    }
}

fn coerce_datetime(v: &Value) -> Result<DateTime<FixedOffset>> {
    match v.strip_casts() {
        Value::DateTimeVal(d) => Ok(d.0),
        Value::StrVal(s) => DateTime::parse_from_rfc3339(s)
            .map_err(|_| Error::type_mismatch(format!("{s:?} is not a valid RFC 3339 datetime"))),
        other => Err(Error::type_mismatch(format!("{other:?} cannot be compared as DateTime"))),
    }
}

fn coerce_time(v: &Value) -> Result<NaiveTime> {
    match v.strip_casts() {
        Value::TimeVal(t) => Ok(t.0),
        Value::StrVal(s) => NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .map_err(|_| Error::type_mismatch(format!("{s:?} is not a valid HH:MM[:SS] time"))),
        other => Err(Error::type_mismatch(format!("{other:?} cannot be compared as Time"))),
    }
}

fn coerce_hex(v: &Value) -> Result<HexValue> {
    match v.strip_casts() {
        Value::HexVal(h) => Ok(h.clone()),
        Value::StrVal(s) => HexValue::parse(s),
        other => Err(Error::type_mismatch(format!("{other:?} cannot be compared as Hex"))),
    }
}

fn substitute_string_value(v: &StringValue, resolver: &dyn AttributeResolver) -> Result<StringValue> {
    match v {
        StringValue::Attribute(a) => Ok(StringValue::StrVal(coerce_string(&promote(resolver, a)?)?)),
        StringValue::StrCast(inner) => Ok(StringValue::StrCast(Box::new(substitute_attributes(inner, resolver)?))),
        other => Ok(other.clone()),
    }
}

fn is_string_literal(v: &StringValue) -> bool {
    match v {
        StringValue::Field(_) => false,
        StringValue::StrCast(inner) => inner.is_literal(),
        _ => true,
    }
}

/// `pub(crate)`: reused by [`crate::eval::descriptor`] for string-op needle
/// literals.
pub(crate) fn string_value_as_string(v: &StringValue) -> Result<String> {
    match v {
        StringValue::StrVal(s) => Ok(s.clone()),
        StringValue::StrCast(inner) => coerce_string(inner),
        StringValue::Field(_) => Err(Error::type_mismatch("field operand is not a literal")),
        StringValue::Attribute(_) => unreachable!("attributes are substituted before this point"),
    }
}

fn wrap_string_field_cast(v: StringValue) -> StringValue {
    match v {
        StringValue::Field(f) => StringValue::StrCast(Box::new(Value::Field(f))),
        other => other,
    }
}

fn rebuild_string_op(op: StringOp, a: StringValue, b: StringValue) -> Expression {
    match op {
        StringOp::Regex => Expression::Regex(a, b),
        StringOp::Contains => Expression::Contains(a, b),
        StringOp::StartsWith => Expression::StartsWith(a, b),
        StringOp::EndsWith => Expression::EndsWith(a, b),
    }
}

fn simplify_string_op(
    op: StringOp,
    a: &StringValue,
    b: &StringValue,
    resolver: &dyn AttributeResolver,
) -> Result<(Expression, Decision)> {
    let a = substitute_string_value(a, resolver)?;
    let b = substitute_string_value(b, resolver)?;

    if is_string_literal(&a) && is_string_literal(&b) {
        let haystack = string_value_as_string(&a)?;
        let needle = string_value_as_string(&b)?;
        let result = evaluate_string_op(op, &haystack, &needle)?;
        return Ok((Expression::Boolean(result), Decision::from_bool(result)));
    }

    Ok((
        rebuild_string_op(op, wrap_string_field_cast(a), wrap_string_field_cast(b)),
        Decision::Undecided,
    ))
}

/// `pub(crate)`: reused by [`crate::eval::descriptor`] against JSON-sourced
/// haystacks instead of resolved SQL columns.
pub(crate) fn evaluate_string_op(op: StringOp, haystack: &str, needle: &str) -> Result<bool> {
    match op {
        StringOp::Contains => Ok(haystack.contains(needle)),
        StringOp::StartsWith => Ok(haystack.starts_with(needle)),
        StringOp::EndsWith => Ok(haystack.ends_with(needle)),
        StringOp::Regex => {
            let re = regex::Regex::new(needle)
                .map_err(|e| Error::parse(format!("invalid regex {needle:?}: {e}")))?;
            Ok(re.is_match(haystack))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AttributeRef, FieldRef, Value};

    struct NullResolver;
    impl AttributeResolver for NullResolver {
        fn resolve(&self, attr: &AttributeRef) -> Result<Box<dyn AttributeValue>> {
            Err(Error::resolver(format!("no attributes configured, got {attr:?}")))
        }
        fn global(&self, _name: &str) -> Result<DateTime<FixedOffset>> {
            Err(Error::resolver("no global clock configured"))
        }
    }

    struct MapResolver(std::collections::HashMap<String, String>);
    impl AttributeResolver for MapResolver {
        fn resolve(&self, attr: &AttributeRef) -> Result<Box<dyn AttributeValue>> {
            self.0
                .get(&attr.0)
                .cloned()
                .map(|s| Box::new(s) as Box<dyn AttributeValue>)
                .ok_or_else(|| Error::resolver(format!("unknown attribute {attr:?}")))
        }
        fn global(&self, _name: &str) -> Result<DateTime<FixedOffset>> {
            DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").map_err(|e| Error::resolver(e.to_string()))
        }
    }

    #[test]
    fn literal_eq_resolves_to_definite_decision() {
        let expr = Expression::Eq(Value::StrVal("shell".into()), Value::StrVal("shell".into()));
        let (simplified, decision) = simplify(&expr, &NullResolver).unwrap();
        assert_eq!(decision, Decision::True);
        assert_eq!(simplified, Expression::Boolean(true));
    }

    #[test]
    fn and_short_circuits_on_false_regardless_of_other_children() {
        let expr = Expression::And(vec![
            Expression::Boolean(false),
            Expression::Eq(Value::Field(FieldRef("$aasdesc#idShort".into())), Value::StrVal("x".into())),
        ]);
        let (simplified, decision) = simplify(&expr, &NullResolver).unwrap();
        assert_eq!(decision, Decision::False);
        assert_eq!(simplified, Expression::Boolean(false));
    }

    #[test]
    fn empty_and_is_true_empty_or_is_false() {
        let (e1, d1) = simplify(&Expression::And(vec![]), &NullResolver).unwrap();
        assert_eq!((e1, d1), (Expression::Boolean(true), Decision::True));
        let (e2, d2) = simplify(&Expression::Or(vec![]), &NullResolver).unwrap();
        assert_eq!((e2, d2), (Expression::Boolean(false), Decision::False));
    }

    #[test]
    fn and_dedupes_identical_survivors() {
        let field_eq = Expression::Eq(Value::Field(FieldRef("$aasdesc#idShort".into())), Value::StrVal("x".into()));
        let expr = Expression::And(vec![field_eq.clone(), field_eq]);
        let (simplified, decision) = simplify(&expr, &NullResolver).unwrap();
        assert_eq!(decision, Decision::Undecided);
        assert!(matches!(simplified, Expression::Eq(..)));
    }

    #[test]
    fn field_operand_is_wrapped_with_matching_cast() {
        let expr = Expression::Gt(Value::Field(FieldRef("$aasdesc#id".into())), Value::NumVal(10.0));
        let (simplified, decision) = simplify(&expr, &NullResolver).unwrap();
        assert_eq!(decision, Decision::Undecided);
        match simplified {
            Expression::Gt(a, _) => assert!(a.is_num_cast()),
            other => panic!("expected Gt, got {other:?}"),
        }
    }

    #[test]
    fn ordered_comparison_on_strings_falls_back_to_false() {
        let expr = Expression::Gt(Value::StrVal("a".into()), Value::StrVal("b".into()));
        let (simplified, decision) = simplify(&expr, &NullResolver).unwrap();
        assert_eq!(decision, Decision::False);
        assert_eq!(simplified, Expression::Boolean(false));
    }

    #[test]
    fn attribute_is_promoted_through_resolver() {
        let mut map = std::collections::HashMap::new();
        map.insert("role".to_string(), "admin".to_string());
        let resolver = MapResolver(map);
        let expr = Expression::Eq(
            Value::Attribute(AttributeRef("role".into())),
            Value::StrVal("admin".into()),
        );
        let (_, decision) = simplify(&expr, &resolver).unwrap();
        assert_eq!(decision, Decision::True);
    }

    #[test]
    fn not_inverts_definite_decisions() {
        let (simplified, decision) = simplify(&Expression::Not(Box::new(Expression::Boolean(true))), &NullResolver).unwrap();
        assert_eq!(decision, Decision::False);
        assert_eq!(simplified, Expression::Boolean(false));
    }

    #[test]
    fn contains_evaluates_literal_strings() {
        let expr = Expression::Contains(
            StringValue::StrVal("hello world".into()),
            StringValue::StrVal("world".into()),
        );
        let (simplified, decision) = simplify(&expr, &NullResolver).unwrap();
        assert_eq!(decision, Decision::True);
        assert_eq!(simplified, Expression::Boolean(true));
    }
}
