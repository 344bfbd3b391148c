//! Field path resolver (spec §4.4 — component C4).
//!
//! Walks the tokens produced by [`crate::path::tokenizer`] under a
//! [`ResolveContext`], consulting the mapping tables in
//! [`crate::resolve::mappings`] at each array segment to accumulate a join
//! chain, and resolving the final token against the terminal column table.

use crate::ast::{FieldRoot, NormalizedField};
use crate::error::{Error, Result};
use crate::path::{tokenize, ArrayIndex, Token};

use super::context::ResolveContext;
use super::mappings::{self, ArraySegmentMapping};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedJoin {
    pub table: &'static str,
    pub alias: &'static str,
    /// Join condition's left side, with `{base}` already substituted.
    pub on_left: String,
    pub on_right: &'static str,
}

/// One `[n]`/`[]` array selector crossed while resolving the path, carrying
/// the column the position predicate (or `$match` co-row predicate) should
/// compare against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArrayBinding {
    pub array_name: String,
    pub index: ArrayIndex,
    pub position_column: String,
    /// How many [`ResolvedJoin`]s this array segment contributed to
    /// `ResolvedFieldPath::joins`, e.g. 2 for `keys[n]` under
    /// `externalSubjectId` (reference, then reference_key). Lets the
    /// `$match` compiler (spec §4.6) truncate a join chain to exactly the
    /// common array-token prefix shared by its children.
    pub joins_consumed: usize,
}

#[derive(Debug, Clone)]
pub struct ResolvedFieldPath {
    pub context: ResolveContext,
    /// Final column expression, with `{base}` already substituted.
    pub column: String,
    pub joins: Vec<ResolvedJoin>,
    pub array_bindings: Vec<ArrayBinding>,
    pub id_short_path: Option<String>,
}

/// What immediately preceded the token currently being resolved, used to
/// disambiguate array segments and terminals that share a name across
/// contexts (spec §4.4's "keys under externalSubjectId vs. semanticId"
/// example).
enum PrevSegment {
    Simple(String),
    Array {
        name: String,
        parent_simple: Option<String>,
    },
}

fn pick_array_mapping(
    name: &str,
    context: ResolveContext,
    parent_simple: Option<&str>,
) -> Result<ArraySegmentMapping> {
    if name == "keys" && parent_simple == Some("semanticId") {
        if let Some(m) = mappings::keys_under_semantic_id_for_context(context) {
            return Ok(m);
        }
    }
    let entry = mappings::array_segment_mappings()
        .get(name)
        .ok_or_else(|| Error::unsupported_field(format!("unknown array segment {name:?}")))?;
    entry.resolve(context, parent_simple).ok_or_else(|| {
        Error::unsupported_field(format!(
            "array segment {name:?} is not valid in context {context} \
             (parent simple segment: {parent_simple:?})"
        ))
    })
}

/// Resolve a normalized field reference's path against its root's starting
/// context, producing the join chain and final column for SQL lowering.
pub fn resolve_field_path(normalized: &NormalizedField) -> Result<ResolvedFieldPath> {
    let tokens = tokenize(&normalized.path)?;
    let (mut context, initial_alias) = ResolveContext::initial(&normalized.root);
    let mut base = initial_alias.to_string();

    let mut joins = Vec::new();
    let mut array_bindings = Vec::new();
    let mut prev_segment: Option<PrevSegment> = None;

    let last = tokens.len() - 1;
    let mut column = None;

    for (i, token) in tokens.iter().enumerate() {
        if i == last {
            match token {
                Token::Simple(name) => {
                    let (parent_simple, array_parent) = match &prev_segment {
                        Some(PrevSegment::Simple(s)) => (Some(s.clone()), None),
                        Some(PrevSegment::Array { name, parent_simple }) => {
                            (parent_simple.clone(), Some(name.clone()))
                        }
                        None => (None, None),
                    };
                    let mapping = mappings::terminal_column_mappings()
                        .get(name.as_str())
                        .ok_or_else(|| {
                            Error::unsupported_field(format!("unknown terminal field {name:?}"))
                        })?;
                    let template = mapping
                        .resolve(context, parent_simple.as_deref(), array_parent.as_deref())
                        .ok_or_else(|| {
                            Error::unsupported_field(format!(
                                "field {name:?} is not valid in context {context} \
                                 (parent simple segment: {parent_simple:?}, \
                                 array parent: {array_parent:?})"
                            ))
                        })?;
                    column = Some(template.replace("{base}", &base));
                }
                Token::Array { name, .. } => {
                    return Err(Error::unsupported_field(format!(
                        "path cannot end in array segment {name:?}"
                    )));
                }
            }
        } else {
            match token {
                Token::Simple(name) => {
                    prev_segment = Some(PrevSegment::Simple(name.clone()));
                }
                Token::Array { name, index } => {
                    let parent_simple = match &prev_segment {
                        Some(PrevSegment::Simple(s)) => Some(s.clone()),
                        _ => None,
                    };
                    let mapping = pick_array_mapping(name, context, parent_simple.as_deref())?;

                    for step in mapping.joins {
                        let on_left = step.on_left.replace("{base}", &base);
                        joins.push(ResolvedJoin {
                            table: step.table,
                            alias: step.alias,
                            on_left,
                            on_right: step.on_right,
                        });
                        base = step.alias.to_string();
                    }
                    let position_column = mapping.position_column.replace("{base}", &base);
                    array_bindings.push(ArrayBinding {
                        array_name: name.clone(),
                        index: *index,
                        position_column,
                        joins_consumed: mapping.joins.len(),
                    });
                    context = mapping.next_context;
                    prev_segment = Some(PrevSegment::Array {
                        name: name.clone(),
                        parent_simple,
                    });
                }
            }
        }
    }

    let id_short_path = match &normalized.root {
        FieldRoot::Sme { id_short_path } => id_short_path.clone(),
        _ => None,
    };

    Ok(ResolvedFieldPath {
        context,
        column: column.expect("loop always resolves the terminal column or returns early"),
        joins,
        array_bindings,
        id_short_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::normalize_field;

    fn resolve(raw: &str) -> ResolvedFieldPath {
        let normalized = normalize_field(raw).unwrap();
        resolve_field_path(&normalized).unwrap()
    }

    #[test]
    fn resolves_simple_aasdesc_terminal() {
        let r = resolve("$aasdesc#idShort");
        assert_eq!(r.column, "aas_descriptor.id_short");
        assert!(r.joins.is_empty());
        assert!(r.array_bindings.is_empty());
    }

    #[test]
    fn resolves_nested_endpoint_under_smdesc() {
        let r = resolve("$smdesc#endpoints[0].protocolInformation.href");
        assert_eq!(r.context, ResolveContext::SubmodelDescriptorEndpoint);
        assert_eq!(r.column, "endpoint.href");
        assert_eq!(r.joins.len(), 2);
        assert_eq!(r.joins[0].table, "submodel_descriptor");
        assert_eq!(r.joins[1].table, "endpoint");
        assert_eq!(
            r.joins[1].on_left,
            "submodel_descriptor.id"
        );
        assert_eq!(r.array_bindings.len(), 2);
    }

    #[test]
    fn disambiguates_keys_by_prev_simple() {
        let external = resolve(
            "$aasdesc#specificAssetIds[0].externalSubjectId.keys[1].value",
        );
        assert_eq!(external.column, "external_subject_reference_key.value");
        assert_eq!(external.joins.last().unwrap().table, "reference_key");
    }

    #[test]
    fn disambiguates_semantic_id_keys_by_sme_context() {
        let r = resolve("$sme#semanticId.keys[0].value");
        assert_eq!(r.context, ResolveContext::SME);
        assert_eq!(r.column, "semantic_id_reference_key.value");
    }

    #[test]
    fn rejects_unknown_terminal() {
        let normalized = normalize_field("$aasdesc#notAField").unwrap();
        assert!(resolve_field_path(&normalized).is_err());
    }

    #[test]
    fn rejects_path_ending_in_array() {
        let normalized = normalize_field("$aasdesc#specificAssetIds[0]").unwrap();
        assert!(resolve_field_path(&normalized).is_err());
    }

    /// `$bd` carries a root and starting context (spec §4.4: `$bd→BD`) but no
    /// array/terminal mapping is specified for it anywhere in the mapping
    /// tables, so every `$bd#…` reference fails resolution with a clean
    /// `UnsupportedField` rather than a generic/confusing error.
    #[test]
    fn bd_root_resolves_to_a_clean_unsupported_field_error() {
        let normalized = normalize_field("$bd#id").unwrap();
        let err = resolve_field_path(&normalized).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::UnsupportedField);
    }
}
