//! `ObjectItem` parser (spec §6 "ObjectItem grammar").
//!
//! A policy target is a single-key JSON object discriminated by one of
//! `ROUTE, IDENTIFIABLE, REFERABLE, FRAGMENT, DESCRIPTOR`; the value under
//! that key is itself a small string-form grammar rather than a nested JSON
//! node, e.g. `$sme("1234").someProp.items[2]`. This is a closed,
//! fully-specified grammar used adjacent to expressions (SPEC_FULL §B.8), so
//! it gets a hand-rolled parser here rather than a general grammar engine.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::path::tokenize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum IdentifiableKind {
    Aas,
    Sm,
    Cd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum DescriptorKind {
    AasDesc,
    SmDesc,
}

/// The `"<id|*>"` slot shared by every string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum IdSelector {
    Id(String),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq, JsonSchema)]
pub enum ObjectItem {
    Route(String),
    Identifiable {
        kind: IdentifiableKind,
        id: IdSelector,
    },
    Referable {
        id: IdSelector,
        id_short_path: String,
    },
    Fragment {
        id: IdSelector,
        id_short_path: String,
        fragments: Vec<String>,
    },
    Descriptor {
        kind: DescriptorKind,
        id: IdSelector,
    },
}

/// The wire shape, one key per discriminant, each carrying the raw string
/// form (spec §6). Kept private: callers go through [`ObjectItem::parse`].
#[derive(Deserialize)]
enum Wire {
    #[serde(rename = "ROUTE")]
    Route(String),
    #[serde(rename = "IDENTIFIABLE")]
    Identifiable(String),
    #[serde(rename = "REFERABLE")]
    Referable(String),
    #[serde(rename = "FRAGMENT")]
    Fragment(String),
    #[serde(rename = "DESCRIPTOR")]
    Descriptor(String),
}

impl ObjectItem {
    /// Parse a single-key JSON `ObjectItem` node.
    pub fn parse(json: &serde_json::Value) -> Result<ObjectItem> {
        let wire: Wire = serde_json::from_value(json.clone())
            .map_err(|e| Error::parse(format!("malformed ObjectItem: {e}")))?;
        match wire {
            Wire::Route(s) => Ok(ObjectItem::Route(s)),
            Wire::Identifiable(s) => parse_identifiable(&s),
            Wire::Referable(s) => parse_referable(&s),
            Wire::Fragment(s) => parse_fragment(&s),
            Wire::Descriptor(s) => parse_descriptor(&s),
        }
    }
}

fn parse_id_selector(id: &str) -> Result<IdSelector> {
    if id.is_empty() {
        return Err(Error::parse("empty id literal in ObjectItem string form"));
    }
    Ok(if id == "*" { IdSelector::Wildcard } else { IdSelector::Id(id.to_string()) })
}

/// Split `$root("id")<rest>` into its three parts, leaving `rest` for the
/// caller to interpret (`REFERABLE`/`FRAGMENT` have more after the call;
/// `IDENTIFIABLE`/`DESCRIPTOR` require `rest` to be empty).
fn split_root_call(s: &str) -> Result<(&str, &str, &str)> {
    let after_dollar = s
        .strip_prefix('$')
        .ok_or_else(|| Error::parse(format!("ObjectItem string form must start with `$`: {s:?}")))?;
    let paren = after_dollar
        .find('(')
        .ok_or_else(|| Error::parse(format!("missing `(` in {s:?}")))?;
    let root = &after_dollar[..paren];
    let after_paren = &after_dollar[paren + 1..];
    let after_open_quote = after_paren
        .strip_prefix('"')
        .ok_or_else(|| Error::parse(format!("expected a quoted id after `(` in {s:?}")))?;
    let close_quote = after_open_quote
        .find('"')
        .ok_or_else(|| Error::parse(format!("unterminated id literal in {s:?}")))?;
    let id = &after_open_quote[..close_quote];
    let after_close_quote = &after_open_quote[close_quote + 1..];
    let rest = after_close_quote
        .strip_prefix(')')
        .ok_or_else(|| Error::parse(format!("missing closing `)` in {s:?}")))?;
    Ok((root, id, rest))
}

fn parse_identifiable(s: &str) -> Result<ObjectItem> {
    let (root, id, rest) = split_root_call(s)?;
    if !rest.is_empty() {
        return Err(Error::parse(format!("unexpected trailing content in IDENTIFIABLE form: {s:?}")));
    }
    let kind = match root {
        "aas" => IdentifiableKind::Aas,
        "sm" => IdentifiableKind::Sm,
        "cd" => IdentifiableKind::Cd,
        other => return Err(Error::parse(format!("unknown IDENTIFIABLE root {other:?}"))),
    };
    Ok(ObjectItem::Identifiable { kind, id: parse_id_selector(id)? })
}

fn parse_descriptor(s: &str) -> Result<ObjectItem> {
    let (root, id, rest) = split_root_call(s)?;
    if !rest.is_empty() {
        return Err(Error::parse(format!("unexpected trailing content in DESCRIPTOR form: {s:?}")));
    }
    let kind = match root {
        "aasdesc" => DescriptorKind::AasDesc,
        "smdesc" => DescriptorKind::SmDesc,
        other => return Err(Error::parse(format!("unknown DESCRIPTOR root {other:?}"))),
    };
    Ok(ObjectItem::Descriptor { kind, id: parse_id_selector(id)? })
}

/// `$sme("id").<idShortPath>`, shared by `REFERABLE` and `FRAGMENT`. Returns
/// the resolved id and whatever follows the leading `.`.
fn parse_sme_prefix(s: &str) -> Result<(IdSelector, &str)> {
    let (root, id, rest) = split_root_call(s)?;
    if root != "sme" {
        return Err(Error::parse(format!("REFERABLE/FRAGMENT root must be `sme`, got {root:?}")));
    }
    let path = rest
        .strip_prefix('.')
        .ok_or_else(|| Error::parse(format!("expected `.` after $sme(...) in {s:?}")))?;
    Ok((parse_id_selector(id)?, path))
}

fn parse_referable(s: &str) -> Result<ObjectItem> {
    let (id, path) = parse_sme_prefix(s)?;
    tokenize(path)?;
    Ok(ObjectItem::Referable { id, id_short_path: path.to_string() })
}

/// `<REFERABLE-form> " \"<frag>\"" {one or more}`: the path is delimited
/// from the fragment tail by the first space, since `idShortPath` segments
/// never contain one.
fn parse_fragment(s: &str) -> Result<ObjectItem> {
    let (id, path_and_frags) = parse_sme_prefix(s)?;
    let space = path_and_frags
        .find(' ')
        .ok_or_else(|| Error::parse(format!("FRAGMENT requires at least one quoted fragment: {s:?}")))?;
    let path = &path_and_frags[..space];
    tokenize(path)?;

    let mut rest = &path_and_frags[space..];
    let mut fragments = Vec::new();
    while !rest.is_empty() {
        rest = rest
            .strip_prefix(' ')
            .ok_or_else(|| Error::parse(format!("expected a space before the next fragment literal in {s:?}")))?;
        rest = rest
            .strip_prefix('"')
            .ok_or_else(|| Error::parse(format!("expected a quoted fragment literal in {s:?}")))?;
        let end = rest
            .find('"')
            .ok_or_else(|| Error::parse(format!("unterminated fragment literal in {s:?}")))?;
        fragments.push(rest[..end].to_string());
        rest = &rest[end + 1..];
    }

    Ok(ObjectItem::Fragment { id, id_short_path: path.to_string(), fragments })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_a_route() {
        let item = ObjectItem::parse(&json!({ "ROUTE": "/shells/{id}/submodel" })).unwrap();
        assert_eq!(item, ObjectItem::Route("/shells/{id}/submodel".to_string()));
    }

    #[test]
    fn parses_an_identifiable_with_a_concrete_id() {
        let item = ObjectItem::parse(&json!({ "IDENTIFIABLE": "$aas(\"1234\")" })).unwrap();
        assert_eq!(
            item,
            ObjectItem::Identifiable { kind: IdentifiableKind::Aas, id: IdSelector::Id("1234".to_string()) }
        );
    }

    #[test]
    fn parses_an_identifiable_wildcard() {
        let item = ObjectItem::parse(&json!({ "IDENTIFIABLE": "$sm(\"*\")" })).unwrap();
        assert_eq!(item, ObjectItem::Identifiable { kind: IdentifiableKind::Sm, id: IdSelector::Wildcard });
    }

    #[test]
    fn parses_a_referable_path() {
        let item = ObjectItem::parse(&json!({ "REFERABLE": "$sme(\"1234\").some.items[2]" })).unwrap();
        assert_eq!(
            item,
            ObjectItem::Referable {
                id: IdSelector::Id("1234".to_string()),
                id_short_path: "some.items[2]".to_string(),
            }
        );
    }

    #[test]
    fn parses_a_fragment_with_multiple_literals() {
        let item =
            ObjectItem::parse(&json!({ "FRAGMENT": "$sme(\"1234\").some.path \"frag1\" \"frag2\"" })).unwrap();
        assert_eq!(
            item,
            ObjectItem::Fragment {
                id: IdSelector::Id("1234".to_string()),
                id_short_path: "some.path".to_string(),
                fragments: vec!["frag1".to_string(), "frag2".to_string()],
            }
        );
    }

    #[test]
    fn parses_a_descriptor() {
        let item = ObjectItem::parse(&json!({ "DESCRIPTOR": "$aasdesc(\"*\")" })).unwrap();
        assert_eq!(item, ObjectItem::Descriptor { kind: DescriptorKind::AasDesc, id: IdSelector::Wildcard });
    }

    #[test]
    fn rejects_unknown_identifiable_root() {
        assert!(ObjectItem::parse(&json!({ "IDENTIFIABLE": "$sme(\"1234\")" })).is_err());
    }

    #[test]
    fn rejects_trailing_content_after_identifiable_id() {
        assert!(ObjectItem::parse(&json!({ "IDENTIFIABLE": "$aas(\"1234\")X" })).is_err());
    }

    #[test]
    fn rejects_fragment_with_no_literal() {
        assert!(ObjectItem::parse(&json!({ "FRAGMENT": "$sme(\"1234\").some.path" })).is_err());
    }

    #[test]
    fn rejects_malformed_wire_shape() {
        assert!(ObjectItem::parse(&json!({ "UNKNOWN": "nope" })).is_err());
        assert!(ObjectItem::parse(&json!("not an object")).is_err());
    }
}
