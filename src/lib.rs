//! AAS policy-expression compiler.
//!
//! Turns a caller-supplied [`ast::Expression`] tree (a BaSyx Asset
//! Administration Shell access-control/query predicate) into a
//! dialect-neutral SQL predicate plus flag CTEs, or evaluates it directly
//! against one descriptor's JSON. The compiler is stateless and has no I/O:
//! callers own attribute sourcing, SQL execution, and the outer JSON
//! transport (spec.md §5 "Non-goals").
//!
//! Pipeline: [`path`] tokenizes field-reference paths, [`ast`] is the
//! expression/value type system, [`simplify`] partially evaluates
//! `$attribute` references and constant subtrees, [`resolve`] maps a
//! normalized field path onto a join chain and terminal column, and [`sql`]
//! lowers the simplified tree into a [`sql::CompiledQuery`]. [`eval`] offers
//! a SQL-free alternative: evaluating an expression directly against a
//! descriptor's JSON. [`object_item`] parses the small string-form grammar
//! used for policy targets alongside expressions.

pub mod ast;
pub mod error;
pub mod eval;
pub mod object_item;
pub mod path;
pub mod resolve;
pub mod simplify;
pub mod sql;

pub use error::{Error, ErrorKind, Result, WithErrorInfo};

use ast::Expression;
use simplify::AttributeResolver;
use sql::CompiledQuery;

/// Compiler-local toggles with no execution semantics (SPEC_FULL §A.3,
/// modeled on `prqlc::Options`). The compiler has no I/O, so there is no
/// network/file/DB configuration to carry here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Lower nested-field predicates into grouped flag CTEs (spec §4.5)
    /// rather than the legacy per-predicate `EXISTS` subquery form (spec §9
    /// Open Question 1). Defaults to `true`; the flag-CTE path is strictly
    /// more efficient for a query with several sibling predicates under the
    /// same array, and is the path this crate's own tests exercise most.
    pub use_flag_ctes: bool,
    /// Surface the `$match` wildcard/concrete-index demotion warning (spec
    /// §4.6) in [`sql::CompiledQuery::warnings`]. Defaults to `true`.
    pub emit_match_warnings: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions { use_flag_ctes: true, emit_match_warnings: true }
    }
}

/// Partially evaluate `expr` against `resolver`, then lower it to SQL (spec
/// §4.3 → §4.5/§4.6, the full pipeline short of descriptor evaluation).
///
/// If simplification already reaches a definite [`simplify::Decision`], the
/// compiled predicate is the corresponding boolean literal and `ctes` is
/// empty — callers should check for this before spending effort rendering
/// SQL around it.
pub fn compile(
    expr: &Expression,
    resolver: &dyn AttributeResolver,
    options: CompileOptions,
) -> Result<CompiledQuery> {
    let (simplified, _decision) = simplify::simplify(expr, resolver)?;
    let mut compiled = if options.use_flag_ctes {
        sql::compile(&simplified)?
    } else {
        sql::compile_with_exists(&simplified)?
    };
    if !options.emit_match_warnings {
        compiled.warnings.clear();
    }
    Ok(compiled)
}

/// JSON (de)serialization for [`Expression`] (spec §6), mirroring
/// `prqlc::json::{to_pl, from_pl}` for this crate's own AST.
pub mod json {
    use serde_json::Value as Json;

    use super::ast::Expression;
    use super::error::{Error, Result};

    pub fn to_expression(json: &Json) -> Result<Expression> {
        serde_json::from_value(json.clone()).map_err(|e| Error::parse(format!("malformed Expression JSON: {e}")))
    }

    pub fn from_expression(expr: &Expression) -> Result<Json> {
        serde_json::to_value(expr).map_err(|e| Error::parse(format!("failed to serialize Expression: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, FixedOffset};

    use super::*;
    use ast::{AttributeRef, FieldRef, Value};
    use simplify::AttributeValue;

    struct NullResolver;
    impl AttributeResolver for NullResolver {
        fn resolve(&self, attr: &AttributeRef) -> Result<Box<dyn AttributeValue>> {
            Err(Error::resolver(format!("no attributes configured, got {attr:?}")))
        }
        fn global(&self, _name: &str) -> Result<DateTime<FixedOffset>> {
            Err(Error::resolver("no global clock configured"))
        }
    }

    #[test]
    fn compiles_a_simplifiable_expression_down_to_a_literal() {
        let expr = Expression::Eq(Value::NumVal(1.0), Value::NumVal(1.0));
        let compiled = compile(&expr, &NullResolver, CompileOptions::default()).unwrap();
        assert!(compiled.ctes.is_empty());
        assert!(matches!(compiled.predicate, sql::Predicate::Boolean(true)));
    }

    #[test]
    fn compiles_a_field_predicate_into_a_flag_cte() {
        let expr = Expression::Eq(
            Value::Field(FieldRef("$aasdesc#specificAssetIds[0].name".to_string())),
            Value::StrVal("globalAssetId".to_string()),
        );
        let compiled = compile(&expr, &NullResolver, CompileOptions::default()).unwrap();
        assert_eq!(compiled.ctes.len(), 1);
    }

    #[test]
    fn exists_mode_emits_no_ctes() {
        let expr = Expression::Eq(
            Value::Field(FieldRef("$aasdesc#specificAssetIds[0].name".to_string())),
            Value::StrVal("globalAssetId".to_string()),
        );
        let options = CompileOptions { use_flag_ctes: false, ..Default::default() };
        let compiled = compile(&expr, &NullResolver, options).unwrap();
        assert!(compiled.ctes.is_empty());
    }

    #[test]
    fn json_round_trips_an_expression() {
        let expr = Expression::Eq(
            Value::Field(FieldRef("$aasdesc#idShort".to_string())),
            Value::StrVal("press1".to_string()),
        );
        let json = json::from_expression(&expr).unwrap();
        let back = json::to_expression(&json).unwrap();
        assert_eq!(expr, back);
    }
}
