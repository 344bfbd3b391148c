//! SQL lowerer (spec §4.5, §4.6, §6 — components C6, C7).
//!
//! Ties the dialect-neutral predicate tree ([`ast`]), the flag-CTE collector
//! ([`collector`], [`cte`]), the per-node lowerer ([`lower`]), and the
//! `$match` compiler ([`match_compiler`]) into one [`compile`] entrypoint.

pub mod ast;
pub mod collector;
pub mod cte;
pub mod lower;
pub mod match_compiler;

pub use ast::{CompiledQuery, CteSpec, FlagColumn, ParamValue, Predicate, SqlExpr};
pub use collector::Collector;
pub use lower::LoweringMode;

use crate::ast::Expression;
use crate::error::Result;

/// Lower an already-[`crate::simplify::simplify`]d expression into a
/// [`CompiledQuery`] (spec §6 "Compiled output"), using the flag-CTE path by
/// default (spec §9 Open Question 1).
pub fn compile(expr: &Expression) -> Result<CompiledQuery> {
    let mut collector = Collector::new();
    let mut warnings = Vec::new();
    let predicate = {
        let mut mode = LoweringMode::FlagCte(&mut collector);
        lower::lower(expr, &mut mode, &mut warnings)?
    };
    Ok(CompiledQuery {
        predicate,
        ctes: collector.into_ctes(),
        warnings,
    })
}

/// Lower via the legacy `EXISTS`-subquery path instead of flag CTEs (spec §9
/// Open Question 1), producing no CTEs.
pub fn compile_with_exists(expr: &Expression) -> Result<CompiledQuery> {
    let mut warnings = Vec::new();
    let predicate = {
        let mut mode = LoweringMode::Exists;
        lower::lower(expr, &mut mode, &mut warnings)?
    };
    Ok(CompiledQuery {
        predicate,
        ctes: Vec::new(),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FieldRef, Value};

    #[test]
    fn compiles_an_inline_comparison_with_no_ctes() {
        let expr = Expression::Eq(
            Value::Field(FieldRef("$aasdesc#idShort".to_string())),
            Value::StrVal("press1".to_string()),
        );
        let compiled = compile(&expr).unwrap();
        assert!(compiled.ctes.is_empty());
        assert!(matches!(compiled.predicate, Predicate::Compare { .. }));
    }

    #[test]
    fn compiles_a_nested_field_into_a_flag_cte() {
        let expr = Expression::Eq(
            Value::Field(FieldRef(
                "$aasdesc#specificAssetIds[0].name".to_string(),
            )),
            Value::StrVal("globalAssetId".to_string()),
        );
        let compiled = compile(&expr).unwrap();
        assert_eq!(compiled.ctes.len(), 1);
        assert!(matches!(compiled.predicate, Predicate::FlagRef { .. }));
    }
}
