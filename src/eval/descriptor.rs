//! Descriptor evaluator (spec §4.7 — component C8).
//!
//! Evaluates an [`Expression`] against a single AAS/submodel descriptor
//! represented as generic JSON, with no SQL involved: `$aasdesc`/`$smdesc`
//! paths are walked directly against the JSON tree using the same
//! [`crate::path::tokenizer`] the SQL resolver uses, `[n]` selects an array
//! element by index and `[]` fans out across every element, and a comparison
//! holds if *any* fanned-out leaf satisfies it — the same existential
//! semantics as the SQL `EXISTS`/flag-CTE path in [`crate::sql`].
//!
//! Callers should run [`crate::simplify::simplify`] first if the expression
//! carries `$attribute` operands; this evaluator does not resolve them.

use std::collections::HashSet;

use serde_json::Value as Json;

use crate::ast::{normalize_field, CompareOp, Expression, FieldRef, FieldRoot, StringOp, StringValue, Value};
use crate::error::{Error, Result};
use crate::path::{tokenize, ArrayIndex, Token};

/// One JSON leaf reached while walking a field path, tagged with the array
/// indices crossed to reach it (SPEC_FULL §B.7).
struct Leaf<'a> {
    value: &'a Json,
    indices: Vec<usize>,
}

/// The result of evaluating an [`Expression`] against one descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorEvaluation {
    pub matched: bool,
    /// The root-index combinations of the leaf values that made `matched`
    /// true (SPEC_FULL §B.7 "useful for callers debugging why a descriptor
    /// matched"). Empty when `matched` is false, or when the expression held
    /// without crossing any array (e.g. a top-level literal).
    pub satisfying_indices: Vec<Vec<usize>>,
}

/// Evaluate `expr` against `descriptor` (spec §4.7).
pub fn evaluate(expr: &Expression, descriptor: &Json) -> Result<DescriptorEvaluation> {
    let (matched, satisfying_indices) = eval_node(expr, descriptor)?;
    Ok(DescriptorEvaluation {
        matched,
        satisfying_indices,
    })
}

fn eval_node(expr: &Expression, descriptor: &Json) -> Result<(bool, Vec<Vec<usize>>)> {
    match expr {
        Expression::Boolean(b) => Ok((*b, if *b { vec![Vec::new()] } else { Vec::new() })),
        Expression::And(children) => {
            let mut witnesses = Vec::new();
            for child in children {
                let (ok, w) = eval_node(child, descriptor)?;
                if !ok {
                    return Ok((false, Vec::new()));
                }
                witnesses.extend(w);
            }
            Ok((true, witnesses))
        }
        Expression::Or(children) => {
            let mut any = false;
            let mut witnesses = Vec::new();
            for child in children {
                let (ok, w) = eval_node(child, descriptor)?;
                if ok {
                    any = true;
                    witnesses.extend(w);
                }
            }
            Ok((any, witnesses))
        }
        Expression::Not(inner) => {
            let (ok, _) = eval_node(inner, descriptor)?;
            Ok((!ok, if ok { Vec::new() } else { vec![Vec::new()] }))
        }
        Expression::Match(children) => eval_match(children, descriptor),
        _ => {
            if let Some((op, a, b)) = expr.as_compare() {
                eval_compare(op, a, b, descriptor)
            } else if let Some((op, a, b)) = expr.as_string_op() {
                eval_string_op(op, a, b, descriptor)
            } else {
                unreachable!("every Expression variant is Boolean, And, Or, Not, Match, a compare, or a string op")
            }
        }
    }
}

/// `$match` has no SQL join machinery to lean on here, so same-row identity
/// is approximated directly against the witness index-paths each child's own
/// walk already produced: a child is compatible with a given shared prefix
/// if one of its witnesses starts with it. This is the JSON-native
/// counterpart of the SQL compiler's explicit common-array-token-prefix
/// computation in [`crate::sql::match_compiler`], not a port of it.
fn eval_match(children: &[Expression], descriptor: &Json) -> Result<(bool, Vec<Vec<usize>>)> {
    let mut flat = Vec::new();
    flatten_match(children, &mut flat);

    let mut per_child = Vec::with_capacity(flat.len());
    for child in &flat {
        let (ok, witnesses) = eval_node(child, descriptor)?;
        if !ok {
            return Ok((false, Vec::new()));
        }
        per_child.push(witnesses);
    }

    let prefix_len = per_child
        .iter()
        .flat_map(|w| w.iter().map(|indices| indices.len()))
        .min()
        .unwrap_or(0);

    let mut shared: Option<HashSet<Vec<usize>>> = None;
    for witnesses in &per_child {
        let prefixes: HashSet<Vec<usize>> = witnesses.iter().map(|w| w[..prefix_len].to_vec()).collect();
        shared = Some(match shared {
            None => prefixes,
            Some(existing) => existing.intersection(&prefixes).cloned().collect(),
        });
    }

    match shared {
        Some(set) if !set.is_empty() => Ok((true, set.into_iter().collect())),
        _ => Ok((false, Vec::new())),
    }
}

fn flatten_match<'a>(children: &'a [Expression], out: &mut Vec<&'a Expression>) {
    for child in children {
        if let Expression::Match(inner) = child {
            flatten_match(inner, out);
        } else {
            out.push(child);
        }
    }
}

fn field_in(v: &Value) -> Option<&FieldRef> {
    match v {
        Value::Field(f) => Some(f),
        Value::StrCast(inner)
        | Value::NumCast(inner)
        | Value::BoolCast(inner)
        | Value::TimeCast(inner)
        | Value::DateTimeCast(inner)
        | Value::HexCast(inner) => inner.as_field(),
        _ => None,
    }
}

fn field_in_string_value(v: &StringValue) -> Option<&FieldRef> {
    match v {
        StringValue::Field(f) => Some(f),
        StringValue::StrCast(inner) => inner.as_field(),
        _ => None,
    }
}

fn leaf_as_string(j: &Json) -> Option<String> {
    match j {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        Json::Bool(b) => Some(b.to_string()),
        Json::Null | Json::Array(_) | Json::Object(_) => None,
    }
}

fn walk<'a>(tokens: &[Token], node: &'a Json, indices: Vec<usize>, out: &mut Vec<Leaf<'a>>) {
    let Some((head, rest)) = tokens.split_first() else {
        out.push(Leaf { value: node, indices });
        return;
    };
    match head {
        Token::Simple(name) => {
            if let Some(child) = node.get(name) {
                walk(rest, child, indices, out);
            }
        }
        Token::Array { name, index } => {
            let Some(Json::Array(items)) = node.get(name) else {
                return;
            };
            match index {
                ArrayIndex::Int(n) => {
                    if let Some(item) = items.get(*n as usize) {
                        let mut next = indices.clone();
                        next.push(*n as usize);
                        walk(rest, item, next, out);
                    }
                }
                ArrayIndex::Wildcard => {
                    for (i, item) in items.iter().enumerate() {
                        let mut next = indices.clone();
                        next.push(i);
                        walk(rest, item, next, out);
                    }
                }
            }
        }
    }
}

fn descriptor_leaves<'a>(field: &FieldRef, descriptor: &'a Json) -> Result<Vec<Leaf<'a>>> {
    let normalized = normalize_field(&field.0)?;
    if !matches!(normalized.root, FieldRoot::AasDesc) {
        return Err(Error::unsupported_field(format!(
            "the descriptor evaluator only resolves $aasdesc/$smdesc paths, got {:?}",
            normalized.root
        )));
    }
    let tokens = tokenize(&normalized.path)?;
    let mut leaves = Vec::new();
    walk(&tokens, descriptor, Vec::new(), &mut leaves);
    Ok(leaves)
}

fn eval_compare(op: CompareOp, a: &Value, b: &Value, descriptor: &Json) -> Result<(bool, Vec<Vec<usize>>)> {
    let a_field = field_in(a);
    let b_field = field_in(b);
    match (a_field, b_field) {
        (None, None) => {
            let kind = a.comparable_to(b)?;
            let ok = crate::simplify::evaluate_compare(op, a, b, kind)?;
            Ok((ok, if ok { vec![Vec::new()] } else { Vec::new() }))
        }
        (Some(_), Some(_)) => Err(Error::unsupported_field(
            "comparing two field references directly is not supported in the descriptor evaluator",
        )),
        (Some(field), None) => eval_field_compare(op, field, b, descriptor, true),
        (None, Some(field)) => eval_field_compare(op, field, a, descriptor, false),
    }
}

/// Resolve `field`'s leaves against the descriptor and check each against
/// `literal`, adopting `literal`'s kind the same way a SQL column adopts the
/// other operand's kind in [`crate::sql::lower`] (spec §4.2 `wrapFieldCast`).
fn eval_field_compare(
    op: CompareOp,
    field: &FieldRef,
    literal: &Value,
    descriptor: &Json,
    field_is_left: bool,
) -> Result<(bool, Vec<Vec<usize>>)> {
    let leaves = descriptor_leaves(field, descriptor)?;
    let kind = literal.kind();
    let mut witnesses = Vec::new();
    for leaf in &leaves {
        let Some(text) = leaf_as_string(leaf.value) else {
            continue;
        };
        let synthetic = Value::StrVal(text);
        let (a, b): (&Value, &Value) = if field_is_left {
            (&synthetic, literal)
        } else {
            (literal, &synthetic)
        };
        if crate::simplify::evaluate_compare(op, a, b, kind)? {
            witnesses.push(leaf.indices.clone());
        }
    }
    Ok((!witnesses.is_empty(), witnesses))
}

fn eval_string_op(op: StringOp, a: &StringValue, b: &StringValue, descriptor: &Json) -> Result<(bool, Vec<Vec<usize>>)> {
    let a_field = field_in_string_value(a);
    if a_field.is_none() {
        let haystack = crate::simplify::string_value_as_string(a)?;
        let needle = crate::simplify::string_value_as_string(b)?;
        let ok = crate::simplify::evaluate_string_op(op, &haystack, &needle)?;
        return Ok((ok, if ok { vec![Vec::new()] } else { Vec::new() }));
    }
    if field_in_string_value(b).is_some() {
        return Err(Error::unsupported_field(
            "the pattern operand of a string operator must be a literal",
        ));
    }

    let field = a_field.unwrap();
    let needle = crate::simplify::string_value_as_string(b)?;
    let leaves = descriptor_leaves(field, descriptor)?;
    let mut witnesses = Vec::new();
    for leaf in &leaves {
        if let Some(text) = leaf_as_string(leaf.value) {
            if crate::simplify::evaluate_string_op(op, &text, &needle)? {
                witnesses.push(leaf.indices.clone());
            }
        }
    }
    Ok((!witnesses.is_empty(), witnesses))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field_eq(path: &str, value: &str) -> Expression {
        Expression::Eq(Value::Field(FieldRef(path.to_string())), Value::StrVal(value.to_string()))
    }

    #[test]
    fn matches_a_simple_terminal() {
        let descriptor = json!({ "idShort": "press1" });
        let eval = evaluate(&field_eq("$aasdesc#idShort", "press1"), &descriptor).unwrap();
        assert!(eval.matched);
    }

    #[test]
    fn existential_match_across_a_wildcard_array() {
        let descriptor = json!({
            "specificAssetIds": [
                { "name": "serialNumber", "value": "SN-1" },
                { "name": "globalAssetId", "value": "urn:x:1" },
            ]
        });
        let expr = field_eq("$aasdesc#specificAssetIds[].name", "globalAssetId");
        let eval = evaluate(&expr, &descriptor).unwrap();
        assert!(eval.matched);
        assert_eq!(eval.satisfying_indices, vec![vec![1]]);
    }

    #[test]
    fn no_match_when_no_leaf_satisfies() {
        let descriptor = json!({
            "specificAssetIds": [
                { "name": "serialNumber", "value": "SN-1" },
            ]
        });
        let expr = field_eq("$aasdesc#specificAssetIds[].name", "globalAssetId");
        let eval = evaluate(&expr, &descriptor).unwrap();
        assert!(!eval.matched);
        assert!(eval.satisfying_indices.is_empty());
    }

    #[test]
    fn numeric_promotion_against_a_json_string_leaf() {
        let descriptor = json!({ "specificAssetIds": [{ "value": "42" }] });
        let expr = Expression::Gt(
            Value::NumCast(Box::new(Value::Field(FieldRef(
                "$aasdesc#specificAssetIds[0].value".to_string(),
            )))),
            Value::NumVal(10.0),
        );
        let eval = evaluate(&expr, &descriptor).unwrap();
        assert!(eval.matched);
    }

    #[test]
    fn match_requires_a_shared_row() {
        let descriptor = json!({
            "specificAssetIds": [
                { "name": "serialNumber", "value": "SN-1" },
                { "name": "globalAssetId", "value": "urn:x:1" },
            ]
        });
        let matching = Expression::Match(vec![
            field_eq("$aasdesc#specificAssetIds[].name", "globalAssetId"),
            field_eq("$aasdesc#specificAssetIds[].value", "urn:x:1"),
        ]);
        assert!(evaluate(&matching, &descriptor).unwrap().matched);

        let mismatched = Expression::Match(vec![
            field_eq("$aasdesc#specificAssetIds[].name", "globalAssetId"),
            field_eq("$aasdesc#specificAssetIds[].value", "SN-1"),
        ]);
        assert!(!evaluate(&mismatched, &descriptor).unwrap().matched);
    }

    #[test]
    fn rejects_non_descriptor_roots() {
        let descriptor = json!({});
        let expr = field_eq("$sm#id", "x");
        assert!(evaluate(&expr, &descriptor).is_err());
    }
}
