//! Field reference grammar: `<root> "#" <path>` (spec §3 "Field reference
//! grammar"). Parsing the root and normalizing known fragments happens here;
//! turning the remaining path into tokens is [`crate::path::tokenizer`]'s
//! job, and turning tokens into columns is [`crate::resolve::resolver`]'s.

use crate::error::{Error, Result};

/// The five roots a field reference may start from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRoot {
    AasDesc,
    SmDesc,
    Sm,
    /// `$sme` optionally carries an embedded idShort path
    /// (`$sme.<idShortPath>#...`), bound against the submodel_element row.
    Sme { id_short_path: Option<String> },
    Bd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedField {
    pub root: FieldRoot,
    /// Path suffix after `#`, with known fragments respelled to their
    /// canonical casing.
    pub path: String,
}

/// Fragments whose casing is normalized on sight, keyed by lowercase form.
/// Declared as data (spec §9 design note) so adding a new spelling fix is a
/// data-only change.
const CASE_FIXUPS: &[(&str, &str)] = &[
    ("protocolinformation", "protocolInformation"),
    ("specificassetids", "specificAssetIds"),
    ("submodeldescriptors", "submodelDescriptors"),
    ("externalsubjectid", "externalSubjectId"),
    ("semanticid", "semanticId"),
    ("idshort", "idShort"),
    ("idshortpath", "idShortPath"),
    ("globalassetid", "globalAssetId"),
];

fn fixup_segment(segment: &str) -> String {
    for (lower, canonical) in CASE_FIXUPS {
        if segment.eq_ignore_ascii_case(lower) {
            return (*canonical).to_string();
        }
    }
    segment.to_string()
}

/// Apply [`CASE_FIXUPS`] to every simple-name fragment in a raw path string,
/// leaving array-selector brackets (`[0]`, `[]`) untouched.
fn fixup_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut segment = String::new();
    let mut chars = path.chars().peekable();
    let flush = |segment: &mut String, out: &mut String| {
        if !segment.is_empty() {
            out.push_str(&fixup_segment(segment));
            segment.clear();
        }
    };
    while let Some(c) = chars.next() {
        match c {
            '.' | '[' => {
                flush(&mut segment, &mut out);
                out.push(c);
                if c == '[' {
                    for bracket_char in chars.by_ref() {
                        out.push(bracket_char);
                        if bracket_char == ']' {
                            break;
                        }
                    }
                }
            }
            _ => segment.push(c),
        }
    }
    flush(&mut segment, &mut out);
    out
}

/// Normalize a raw `$field` string into a [`NormalizedField`] (spec §3).
/// `$smdesc#<rest>` is rewritten into `$aasdesc#submodelDescriptors[].<rest>`
/// so the same resolver paths apply to both roots.
pub fn normalize_field(raw: &str) -> Result<NormalizedField> {
    let (root_str, path) = raw
        .split_once('#')
        .ok_or_else(|| Error::parse(format!("field {raw:?} is missing `#`")))?;
    if path.is_empty() {
        return Err(Error::parse(format!("field {raw:?} has an empty path")));
    }
    let path = fixup_path(path);

    if root_str == "$aasdesc" {
        Ok(NormalizedField {
            root: FieldRoot::AasDesc,
            path,
        })
    } else if root_str == "$smdesc" {
        Ok(NormalizedField {
            root: FieldRoot::AasDesc,
            path: format!("submodelDescriptors[].{path}"),
        })
    } else if root_str == "$sm" {
        Ok(NormalizedField {
            root: FieldRoot::Sm,
            path,
        })
    } else if root_str == "$bd" {
        Ok(NormalizedField {
            root: FieldRoot::Bd,
            path,
        })
    } else if root_str == "$sme" || root_str.starts_with("$sme.") {
        let id_short_path = root_str.strip_prefix("$sme.").map(|s| s.to_string());
        Ok(NormalizedField {
            root: FieldRoot::Sme { id_short_path },
            path,
        })
    } else {
        Err(Error::parse(format!(
            "field {raw:?} has an unknown root {root_str:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_known_fragments() {
        let f = normalize_field("$aasdesc#protocolinformation.href").unwrap();
        assert_eq!(f.root, FieldRoot::AasDesc);
        assert_eq!(f.path, "protocolInformation.href");
    }

    #[test]
    fn rewrites_smdesc_to_aasdesc() {
        let f = normalize_field("$smdesc#idShort").unwrap();
        assert_eq!(f.root, FieldRoot::AasDesc);
        assert_eq!(f.path, "submodelDescriptors[].idShort");
    }

    #[test]
    fn carries_sme_id_short_path() {
        let f = normalize_field("$sme.parent.child#value").unwrap();
        assert_eq!(
            f.root,
            FieldRoot::Sme {
                id_short_path: Some("parent.child".to_string())
            }
        );
        assert_eq!(f.path, "value");
    }

    #[test]
    fn rejects_missing_hash() {
        assert!(normalize_field("$aasdesc.idShort").is_err());
    }

    #[test]
    fn rejects_unknown_root() {
        assert!(normalize_field("$unknown#idShort").is_err());
    }

    #[test]
    fn leaves_array_brackets_untouched() {
        let f = normalize_field("$aasdesc#specificAssetIds[0].externalsubjectid.keys[1].value")
            .unwrap();
        assert_eq!(
            f.path,
            "specificAssetIds[0].externalSubjectId.keys[1].value"
        );
    }
}
