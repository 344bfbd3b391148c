//! Compiler error type.
//!
//! Modeled on `prqlc_parser::error`: a single hand-rolled `Error` struct
//! carrying a closed `ErrorKind` and a human-readable `Reason`, rather than a
//! tree of `thiserror` variants. Lowering never recovers from an error (see
//! spec §7); every fallible function in this crate returns [`Result`].

use std::fmt::{self, Debug, Display, Formatter};

/// The closed set of error kinds from spec §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed JSON or value node with no discriminant, cast + sibling
    /// literal, unknown field key.
    Parse,
    /// Operands of different concrete kinds, or an explicit cast target that
    /// disagrees with the terminal column's SQL type.
    TypeMismatch,
    /// Unknown terminal, unknown array segment, or a context mismatch.
    UnsupportedField,
    /// `$match` children share no common array prefix.
    MatchShape,
    /// Ordered comparison requested on a kind that doesn't support it.
    OperatorDomain,
    /// The caller-supplied attribute resolver returned an incompatible value.
    Resolver,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Parse => "parse error",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::UnsupportedField => "unsupported field",
            ErrorKind::MatchShape => "$match shape error",
            ErrorKind::OperatorDomain => "operator domain error",
            ErrorKind::Resolver => "resolver error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub reason: String,
    pub hints: Vec<String>,
}

impl Error {
    pub fn new<S: ToString>(kind: ErrorKind, reason: S) -> Self {
        Error {
            kind,
            reason: reason.to_string(),
            hints: Vec::new(),
        }
    }

    pub fn parse<S: ToString>(reason: S) -> Self {
        Error::new(ErrorKind::Parse, reason)
    }

    pub fn type_mismatch<S: ToString>(reason: S) -> Self {
        Error::new(ErrorKind::TypeMismatch, reason)
    }

    pub fn unsupported_field<S: ToString>(reason: S) -> Self {
        Error::new(ErrorKind::UnsupportedField, reason)
    }

    pub fn match_shape<S: ToString>(reason: S) -> Self {
        Error::new(ErrorKind::MatchShape, reason)
    }

    pub fn operator_domain<S: ToString>(reason: S) -> Self {
        Error::new(ErrorKind::OperatorDomain, reason)
    }

    pub fn resolver<S: ToString>(reason: S) -> Self {
        Error::new(ErrorKind::Resolver, reason)
    }
}

/// Mirrors `prqlc_parser::error::WithErrorInfo`: a fluent way to attach a
/// hint to an error as it propagates, without building a `Result` chain by
/// hand at every call site.
pub trait WithErrorInfo {
    fn with_hint<S: ToString>(self, hint: S) -> Self;
}

impl WithErrorInfo for Error {
    fn with_hint<S: ToString>(mut self, hint: S) -> Self {
        self.hints.push(hint.to_string());
        self
    }
}

impl<T> WithErrorInfo for Result<T, Error> {
    fn with_hint<S: ToString>(self, hint: S) -> Self {
        self.map_err(|e| e.with_hint(hint))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason)?;
        for hint in &self.hints {
            write!(f, "\n  hint: {hint}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

pub type Result<T, E = Error> = core::result::Result<T, E>;
