//! `$match` same-row compiler (spec §4.6 — component C7).
//!
//! `$match` asserts its children about the *same* tuple of a shared
//! multi-valued collection, rather than letting each child range over its
//! own row independently (the default existential semantics of a bare
//! `$and` over fields under the same wildcard array). It lowers to one
//! flag-CTE grouped on the shared array's join chain, with every child's
//! predicate ANDed inside a single `BOOL_OR` flag.

use crate::ast::{normalize_field, CompareOp, Expression, FieldRef};
use crate::error::{Error, Result};
use crate::path::{tokenize, ArrayIndex, Token};
use crate::resolve::{resolve_field_path, ResolvedFieldPath};

use super::ast::{ParamValue, Predicate, SqlExpr};
use super::lower::{build_compare, build_string_op, string_value_field, unwrap_field, LoweringMode};

/// Recursively flatten nested `$match` nodes into one flat list of children
/// (spec §4.6 "recursively flatten nested `$match` children into the same
/// group").
fn flatten<'a>(children: &'a [Expression], out: &mut Vec<&'a Expression>) {
    for child in children {
        if let Expression::Match(inner) = child {
            flatten(inner, out);
        } else {
            out.push(child);
        }
    }
}

fn field_in_value(v: &crate::ast::Value) -> Option<&FieldRef> {
    unwrap_field(v).map(|(f, _)| f)
}

fn field_in_string_value(v: &crate::ast::StringValue) -> Option<&FieldRef> {
    string_value_field(v).map(|(f, _)| f)
}

/// The single field a `$match` child's predicate names. `$match` only makes
/// sense over per-row comparisons, so a child that is itself a connective or
/// that names two (or zero) fields is a shape error.
fn single_field(expr: &Expression) -> Result<&FieldRef> {
    if let Some((_, a, b)) = expr.as_compare() {
        return field_in_value(a)
            .or_else(|| field_in_value(b))
            .ok_or_else(|| Error::match_shape("each $match child must reference exactly one field"));
    }
    if let Some((_, a, b)) = expr.as_string_op() {
        return field_in_string_value(a)
            .or_else(|| field_in_string_value(b))
            .ok_or_else(|| Error::match_shape("each $match child must reference exactly one field"));
    }
    Err(Error::match_shape(
        "$match children must be comparisons or string operators, not nested connectives",
    ))
}

struct ArrayToken {
    name: String,
    index: ArrayIndex,
}

fn array_tokens(field: &FieldRef) -> Result<Vec<ArrayToken>> {
    let normalized = normalize_field(&field.0)?;
    let tokens = tokenize(&normalized.path)?;
    Ok(tokens
        .into_iter()
        .filter_map(|t| match t {
            Token::Array { name, index } => Some(ArrayToken { name, index }),
            Token::Simple(_) => None,
        })
        .collect())
}

/// The longest prefix of array tokens shared by every child, by name; where
/// names agree but a concrete index diverges across children, the position
/// is kept in the prefix but demoted to a wildcard (spec §4.6 "wildcards
/// unify with concrete indices by demoting to wildcard within the group"),
/// with a warning surfaced both via `log::warn!` and the compiled output's
/// `warnings` list.
fn common_array_prefix(token_lists: &[Vec<ArrayToken>], warnings: &mut Vec<String>) -> Vec<ArrayToken> {
    let min_len = token_lists.iter().map(|l| l.len()).min().unwrap_or(0);
    let mut prefix = Vec::new();
    for i in 0..min_len {
        let name = &token_lists[0][i].name;
        if !token_lists.iter().all(|l| &l[i].name == name) {
            break;
        }
        let first_index = token_lists[0][i].index;
        let all_same = token_lists.iter().all(|l| l[i].index == first_index);
        let index = if all_same {
            first_index
        } else {
            let message =
                format!("$match: array segment {name:?} has differing indices across children; demoting to wildcard");
            log::warn!("{message}");
            warnings.push(message);
            ArrayIndex::Wildcard
        };
        prefix.push(ArrayToken {
            name: name.clone(),
            index,
        });
    }
    prefix
}

fn prefix_joins_consumed(resolved: &ResolvedFieldPath, prefix_len: usize) -> usize {
    resolved.array_bindings.iter().take(prefix_len).map(|b| b.joins_consumed).sum()
}

fn prefix_where(resolved: &ResolvedFieldPath, prefix_len: usize) -> Option<Predicate> {
    let mut parts: Vec<Predicate> = resolved
        .array_bindings
        .iter()
        .take(prefix_len)
        .filter_map(|b| match b.index {
            ArrayIndex::Int(n) => Some(Predicate::Compare {
                op: CompareOp::Eq,
                left: SqlExpr::Column(b.position_column.clone()),
                right: SqlExpr::Param(ParamValue::Int(n as i64)),
            }),
            ArrayIndex::Wildcard => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else if parts.len() == 1 {
        Some(parts.remove(0))
    } else {
        Some(Predicate::And(parts))
    }
}

/// Lower a `$match` group (spec §4.6, §9 worked example "scenario 5: same
/// `specificAssetIds[n]` row").
pub fn lower_match(children: &[Expression], mode: &mut LoweringMode, warnings: &mut Vec<String>) -> Result<Predicate> {
    let mut flat = Vec::new();
    flatten(children, &mut flat);

    let fields: Vec<&FieldRef> = flat.iter().map(|c| single_field(c)).collect::<Result<_>>()?;
    let token_lists: Vec<Vec<ArrayToken>> = fields.iter().map(|f| array_tokens(f)).collect::<Result<_>>()?;

    let prefix = common_array_prefix(&token_lists, warnings);
    if prefix.is_empty() {
        return Err(Error::match_shape("$match children share no common array prefix"));
    }

    let resolved: Vec<ResolvedFieldPath> = fields
        .iter()
        .map(|f| resolve_field_path(&normalize_field(&f.0)?))
        .collect::<Result<_>>()?;

    let consumed = prefix_joins_consumed(&resolved[0], prefix.len());
    for r in &resolved {
        if r.joins.len() != consumed {
            return Err(Error::match_shape(
                "$match children whose fields diverge into separate array segments beyond their \
                 shared prefix are not supported",
            ));
        }
    }

    let restricting = prefix_where(&resolved[0], prefix.len());
    let mut joins = resolved[0].joins.clone();
    let base = joins.remove(0);

    let mut child_predicates = Vec::with_capacity(flat.len());
    for child in &flat {
        let predicate = if let Some((op, a, b)) = child.as_compare() {
            build_compare(op, a, b)?.0
        } else if let Some((op, a, b)) = child.as_string_op() {
            build_string_op(op, a, b)?.0
        } else {
            unreachable!("single_field already rejected non-comparison, non-string-op children")
        };
        child_predicates.push(predicate);
    }
    let conjoined = Predicate::And(child_predicates);

    match mode {
        LoweringMode::FlagCte(collector) => Ok(collector.register_match(base, joins, restricting, conjoined)),
        LoweringMode::Exists => {
            let mut where_parts = Vec::new();
            if let Some(r) = restricting {
                where_parts.push(r);
            }
            where_parts.push(conjoined);
            let where_predicate = if where_parts.len() == 1 {
                where_parts.into_iter().next().unwrap()
            } else {
                Predicate::And(where_parts)
            };
            Ok(Predicate::Exists {
                base,
                joins,
                where_predicate: Box::new(where_predicate),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Value;
    use super::super::collector::Collector;

    fn eq_field(path: &str, value: &str) -> Expression {
        Expression::Eq(
            Value::Field(FieldRef(path.to_string())),
            Value::StrVal(value.to_string()),
        )
    }

    #[test]
    fn shares_one_cte_with_a_bool_or_flag() {
        let children = vec![
            eq_field("$aasdesc#specificAssetIds[].name", "globalAssetId"),
            eq_field("$aasdesc#specificAssetIds[].value", "urn:x:1"),
        ];
        let mut collector = Collector::new();
        let mut mode = LoweringMode::FlagCte(&mut collector);
        let mut warnings = Vec::new();
        let predicate = lower_match(&children, &mut mode, &mut warnings).unwrap();
        assert!(matches!(predicate, Predicate::FlagRef { .. }));

        let ctes = collector.into_ctes();
        assert_eq!(ctes.len(), 1);
        assert_eq!(ctes[0].flags.len(), 1);
        match &ctes[0].flags[0].predicate {
            Predicate::And(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected a conjoined predicate, got {other:?}"),
        }
    }

    #[test]
    fn reuses_the_flag_for_an_identical_match_group() {
        let children = vec![
            eq_field("$aasdesc#specificAssetIds[].name", "globalAssetId"),
            eq_field("$aasdesc#specificAssetIds[].value", "urn:x:1"),
        ];
        let mut collector = Collector::new();
        let mut warnings = Vec::new();
        let a = {
            let mut mode = LoweringMode::FlagCte(&mut collector);
            lower_match(&children, &mut mode, &mut warnings).unwrap()
        };
        let b = {
            let mut mode = LoweringMode::FlagCte(&mut collector);
            lower_match(&children, &mut mode, &mut warnings).unwrap()
        };
        assert_eq!(a, b);
        assert_eq!(collector.into_ctes()[0].flags.len(), 1);
    }

    #[test]
    fn demotes_differing_concrete_indices_and_warns() {
        let children = vec![
            eq_field("$aasdesc#specificAssetIds[0].name", "globalAssetId"),
            eq_field("$aasdesc#specificAssetIds[1].value", "urn:x:1"),
        ];
        let mut collector = Collector::new();
        let mut mode = LoweringMode::FlagCte(&mut collector);
        let mut warnings = Vec::new();
        let predicate = lower_match(&children, &mut mode, &mut warnings).unwrap();
        assert!(matches!(predicate, Predicate::FlagRef { .. }));
        assert_eq!(warnings.len(), 1);

        let ctes = collector.into_ctes();
        assert!(ctes[0].where_predicate.is_none());
    }

    #[test]
    fn rejects_children_with_no_shared_array() {
        let children = vec![
            eq_field("$aasdesc#idShort", "foo"),
            eq_field("$aasdesc#globalAssetId", "bar"),
        ];
        let mut collector = Collector::new();
        let mut mode = LoweringMode::FlagCte(&mut collector);
        let mut warnings = Vec::new();
        assert!(lower_match(&children, &mut mode, &mut warnings).is_err());
    }

    #[test]
    fn compiles_a_single_child_trivially() {
        let children = vec![eq_field("$aasdesc#specificAssetIds[].name", "globalAssetId")];
        let mut collector = Collector::new();
        let mut mode = LoweringMode::FlagCte(&mut collector);
        let mut warnings = Vec::new();
        let predicate = lower_match(&children, &mut mode, &mut warnings).unwrap();
        assert!(matches!(predicate, Predicate::FlagRef { .. }));

        let ctes = collector.into_ctes();
        assert_eq!(ctes.len(), 1);
        assert_eq!(ctes[0].flags.len(), 1);
        match &ctes[0].flags[0].predicate {
            Predicate::And(parts) => assert_eq!(parts.len(), 1),
            other => panic!("expected the single child's predicate conjoined alone, got {other:?}"),
        }
    }

    #[test]
    fn rejects_a_single_child_with_no_array_segment() {
        let children = vec![eq_field("$aasdesc#idShort", "shell")];
        let mut collector = Collector::new();
        let mut mode = LoweringMode::FlagCte(&mut collector);
        let mut warnings = Vec::new();
        assert!(lower_match(&children, &mut mode, &mut warnings).is_err());
    }
}
