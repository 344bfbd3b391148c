//! Path tokenizer (spec §4.1 — component C1).
//!
//! Contract: given the suffix of a field reference after `#`, produce a
//! finite ordered token list alternating `Simple`/`Array` tokens. The
//! tokenizer is context-free — it has no notion of `$aasdesc` vs. `$sm`, nor
//! of which array names are valid; that interpretation belongs to
//! [`crate::resolve::resolver`].

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayIndex {
    Int(u32),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Simple(String),
    Array { name: String, index: ArrayIndex },
}

fn is_valid_simple_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse a single dot-separated segment, e.g. `specificAssetIds[0]`,
/// `keys[]`, or `idShort`, into exactly one token.
fn parse_segment(segment: &str) -> Result<Token> {
    match segment.find('[') {
        None => {
            if !is_valid_simple_name(segment) {
                return Err(Error::parse(format!("invalid path segment {segment:?}")));
            }
            Ok(Token::Simple(segment.to_string()))
        }
        Some(bracket_start) => {
            let name = &segment[..bracket_start];
            if !is_valid_simple_name(name) {
                return Err(Error::parse(format!("invalid path segment {segment:?}")));
            }
            let rest = &segment[bracket_start..];
            if !rest.ends_with(']') {
                return Err(Error::parse(format!("malformed array selector in {segment:?}")));
            }
            let inner = &rest[1..rest.len() - 1];
            // Reject a second bracket group glued onto this one, e.g.
            // `foo[0][1]` — adjacent array tokens without a simple separator.
            if inner.contains('[') || inner.contains(']') {
                return Err(Error::parse(format!(
                    "adjacent array selectors without a simple separator in {segment:?}"
                )));
            }
            let index = if inner.is_empty() {
                ArrayIndex::Wildcard
            } else {
                let n: u32 = inner
                    .parse()
                    .map_err(|_| Error::parse(format!("invalid array index in {segment:?}")))?;
                ArrayIndex::Int(n)
            };
            Ok(Token::Array {
                name: name.to_string(),
                index,
            })
        }
    }
}

/// Tokenize the path suffix of a normalized field reference.
pub fn tokenize(path: &str) -> Result<Vec<Token>> {
    if path.is_empty() {
        return Err(Error::parse("empty field path"));
    }
    path.split('.').map(parse_segment).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_simple_chain() {
        let tokens = tokenize("protocolInformation.href").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Simple("protocolInformation".into()),
                Token::Simple("href".into()),
            ]
        );
    }

    #[test]
    fn tokenizes_indexed_array() {
        let tokens =
            tokenize("specificAssetIds[0].externalSubjectId.keys[1].value").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Array {
                    name: "specificAssetIds".into(),
                    index: ArrayIndex::Int(0)
                },
                Token::Simple("externalSubjectId".into()),
                Token::Array {
                    name: "keys".into(),
                    index: ArrayIndex::Int(1)
                },
                Token::Simple("value".into()),
            ]
        );
    }

    #[test]
    fn tokenizes_wildcard() {
        let tokens = tokenize("specificAssetIds[].name").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Array {
                    name: "specificAssetIds".into(),
                    index: ArrayIndex::Wildcard
                },
                Token::Simple("name".into()),
            ]
        );
    }

    #[test]
    fn rejects_empty_path() {
        assert!(tokenize("").is_err());
    }

    #[test]
    fn rejects_malformed_brackets() {
        assert!(tokenize("specificAssetIds[0").is_err());
    }

    #[test]
    fn rejects_adjacent_array_tokens() {
        assert!(tokenize("specificAssetIds[0][1]").is_err());
    }

    #[test]
    fn rejects_non_numeric_index() {
        assert!(tokenize("specificAssetIds[x]").is_err());
    }
}
