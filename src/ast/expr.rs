//! Expression AST (spec §3 "Expression").

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::value::{StringValue, Value};

/// Recursive boolean expression. Exactly one discriminant is populated per
/// node (spec §3); non-literal connectives have at least one child and
/// comparisons have exactly two operands, enforced by the shape of the enum
/// itself rather than by a runtime invariant check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, enum_as_inner::EnumAsInner)]
pub enum Expression {
    #[serde(rename = "$and")]
    And(Vec<Expression>),
    #[serde(rename = "$or")]
    Or(Vec<Expression>),
    #[serde(rename = "$not")]
    Not(Box<Expression>),
    #[serde(rename = "$boolean")]
    Boolean(bool),
    /// Same-row existential quantifier over a shared multi-valued collection
    /// (spec §4.6).
    #[serde(rename = "$match")]
    Match(Vec<Expression>),

    #[serde(rename = "$eq")]
    Eq(Value, Value),
    #[serde(rename = "$ne")]
    Ne(Value, Value),
    #[serde(rename = "$gt")]
    Gt(Value, Value),
    #[serde(rename = "$ge")]
    Ge(Value, Value),
    #[serde(rename = "$lt")]
    Lt(Value, Value),
    #[serde(rename = "$le")]
    Le(Value, Value),

    #[serde(rename = "$regex")]
    Regex(StringValue, StringValue),
    #[serde(rename = "$contains")]
    Contains(StringValue, StringValue),
    #[serde(rename = "$starts-with")]
    StartsWith(StringValue, StringValue),
    #[serde(rename = "$ends-with")]
    EndsWith(StringValue, StringValue),
}

/// The six ordered/equality comparison operators, factored out so the
/// partial evaluator and SQL lowerer can both dispatch on operator kind
/// without re-matching the whole [`Expression`] enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }

    /// Ordered comparisons (`<`, `<=`, `>`, `>=`) are undefined on string and
    /// bool kinds per spec §7 `OperatorDomainError`: the runtime fallback is
    /// `false`, not an error.
    pub fn is_ordered(self) -> bool {
        !matches!(self, CompareOp::Eq | CompareOp::Ne)
    }
}

/// The four string operators, factored out analogously to [`CompareOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOp {
    Regex,
    Contains,
    StartsWith,
    EndsWith,
}

impl Expression {
    /// Decompose a comparison node into its operator and operand pair, or
    /// `None` for non-comparison nodes.
    pub fn as_compare(&self) -> Option<(CompareOp, &Value, &Value)> {
        match self {
            Expression::Eq(a, b) => Some((CompareOp::Eq, a, b)),
            Expression::Ne(a, b) => Some((CompareOp::Ne, a, b)),
            Expression::Gt(a, b) => Some((CompareOp::Gt, a, b)),
            Expression::Ge(a, b) => Some((CompareOp::Ge, a, b)),
            Expression::Lt(a, b) => Some((CompareOp::Lt, a, b)),
            Expression::Le(a, b) => Some((CompareOp::Le, a, b)),
            _ => None,
        }
    }

    pub fn as_string_op(&self) -> Option<(StringOp, &StringValue, &StringValue)> {
        match self {
            Expression::Regex(a, b) => Some((StringOp::Regex, a, b)),
            Expression::Contains(a, b) => Some((StringOp::Contains, a, b)),
            Expression::StartsWith(a, b) => Some((StringOp::StartsWith, a, b)),
            Expression::EndsWith(a, b) => Some((StringOp::EndsWith, a, b)),
            _ => None,
        }
    }

    /// Canonical JSON dedupe key (spec §4.3, §9): `serde_json` output over
    /// this AST is already canonical because there is no map-typed field
    /// anywhere in the tree (only vecs, which preserve order, and structs,
    /// whose field order is fixed by definition) — the design note in spec
    /// §9 permits substituting a structural hash, but since canonical
    /// serialization falls out for free here, there's no reason to.
    pub fn canonical_key(&self) -> String {
        serde_json::to_string(self).expect("Expression serialization is infallible")
    }
}
