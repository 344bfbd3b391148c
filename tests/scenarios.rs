//! End-to-end scenarios mirroring spec.md §8 "Concrete scenarios".

use aasql_compiler::ast::{Expression, FieldRef, Value};
use aasql_compiler::eval::evaluate;
use aasql_compiler::simplify::{simplify, Decision};
use aasql_compiler::sql::{self, ParamValue, Predicate, SqlExpr};

use chrono::{DateTime, FixedOffset};
use serde_json::json;

use aasql_compiler::ast::AttributeRef;
use aasql_compiler::error::Result;
use aasql_compiler::simplify::{AttributeResolver, AttributeValue};

struct NullResolver;
impl AttributeResolver for NullResolver {
    fn resolve(&self, attr: &AttributeRef) -> Result<Box<dyn AttributeValue>> {
        Err(aasql_compiler::Error::resolver(format!("no attributes configured, got {attr:?}")))
    }
    fn global(&self, _name: &str) -> Result<DateTime<FixedOffset>> {
        Err(aasql_compiler::Error::resolver("no global clock configured"))
    }
}

fn eq_field(path: &str, value: &str) -> Expression {
    Expression::Eq(Value::Field(FieldRef(path.to_string())), Value::StrVal(value.to_string()))
}

#[test]
fn scenario_1_inline_eq_casts_the_column_to_text() {
    let expr = eq_field("$aasdesc#idShort", "shell");
    let compiled = sql::compile(&expr).unwrap();
    assert!(compiled.ctes.is_empty());
    match compiled.predicate {
        Predicate::Compare { left: SqlExpr::Cast { inner, sql_type, guarded }, right, .. } => {
            assert_eq!(*inner, SqlExpr::Column("aas_descriptor.id_short".to_string()));
            assert_eq!(sql_type, "text");
            assert!(!guarded);
            assert_eq!(right, SqlExpr::Param(ParamValue::Str("shell".to_string())));
        }
        other => panic!("expected a cast comparison, got {other:?}"),
    }
}

#[test]
fn scenario_2_implicit_number_guard() {
    let expr = Expression::Gt(Value::Field(FieldRef("$aasdesc#id".to_string())), Value::NumVal(10.0));
    let compiled = sql::compile(&expr).unwrap();
    match compiled.predicate {
        Predicate::Compare { left: SqlExpr::Cast { sql_type, guarded, .. }, right, .. } => {
            assert_eq!(sql_type, "double precision");
            assert!(guarded);
            assert_eq!(right, SqlExpr::Param(ParamValue::Float(10.0)));
        }
        other => panic!("expected a guarded numeric cast, got {other:?}"),
    }
}

#[test]
fn scenario_3_flag_cte_with_indices() {
    let expr = eq_field(
        "$aasdesc#specificAssetIds[0].externalSubjectId.keys[1].value",
        "W",
    );
    let compiled = sql::compile(&expr).unwrap();
    assert!(matches!(compiled.predicate, Predicate::FlagRef { .. }));
    assert_eq!(compiled.ctes.len(), 1);

    let cte = &compiled.ctes[0];
    assert_eq!(cte.base.table, "specific_asset_id");
    assert_eq!(cte.joins.len(), 2);
    assert_eq!(cte.joins[0].table, "reference");
    assert_eq!(cte.joins[0].alias, "external_subject_reference");
    assert_eq!(cte.joins[1].table, "reference_key");
    assert_eq!(cte.joins[1].alias, "external_subject_reference_key");
    assert_eq!(cte.group_by, "specific_asset_id.aas_descriptor_id");
    assert_eq!(cte.flags.len(), 1);

    match &cte.flags[0].predicate {
        Predicate::And(parts) => {
            assert_eq!(parts.len(), 3);
            let has_position_0 = parts.iter().any(|p| matches!(
                p,
                Predicate::Compare { left: SqlExpr::Column(c), right: SqlExpr::Param(ParamValue::Int(0)), .. }
                    if c == "specific_asset_id.position"
            ));
            let has_position_1 = parts.iter().any(|p| matches!(
                p,
                Predicate::Compare { left: SqlExpr::Column(c), right: SqlExpr::Param(ParamValue::Int(1)), .. }
                    if c == "external_subject_reference_key.position"
            ));
            assert!(has_position_0, "expected specific_asset_id.position = 0 among {parts:?}");
            assert!(has_position_1, "expected external_subject_reference_key.position = 1 among {parts:?}");
        }
        other => panic!("expected a conjoined position+value predicate, got {other:?}"),
    }
}

#[test]
fn scenario_4_simplify_short_circuits_and_on_false() {
    let expr = Expression::And(vec![
        Expression::Boolean(false),
        eq_field("$aasdesc#idShort", "anything"),
    ]);
    let (simplified, decision) = simplify(&expr, &NullResolver).unwrap();
    assert_eq!(decision, Decision::False);
    assert_eq!(simplified, Expression::Boolean(false));
}

#[test]
fn scenario_5_match_co_row_produces_one_bool_or_flag() {
    let expr = Expression::Match(vec![
        eq_field("$aasdesc#specificAssetIds[].name", "customerPartId"),
        eq_field("$aasdesc#specificAssetIds[].value", "ACME001"),
    ]);
    let compiled = sql::compile(&expr).unwrap();
    assert!(matches!(compiled.predicate, Predicate::FlagRef { .. }));
    assert_eq!(compiled.ctes.len(), 1);
    assert_eq!(compiled.ctes[0].flags.len(), 1);
    match &compiled.ctes[0].flags[0].predicate {
        Predicate::And(parts) => assert_eq!(parts.len(), 2),
        other => panic!("expected the name/value conjuncts ANDed together, got {other:?}"),
    }
}

#[test]
fn scenario_7_sme_id_short_path_root_binds_the_path_alongside_the_terminal() {
    let expr = eq_field("$sme.parent.child#value", "42");
    let compiled = sql::compile(&expr).unwrap();
    assert!(compiled.ctes.is_empty());
    match compiled.predicate {
        Predicate::And(parts) => {
            assert_eq!(parts.len(), 2);
            let has_id_short_path_binding = parts.iter().any(|p| matches!(
                p,
                Predicate::Compare { left: SqlExpr::Column(c), right: SqlExpr::Param(ParamValue::Str(v)), .. }
                    if c == "submodel_element.idshort_path" && v == "parent.child"
            ));
            assert!(has_id_short_path_binding, "expected an idshort_path binding among {parts:?}");
        }
        other => panic!("expected the idshort_path binding conjoined with the terminal comparison, got {other:?}"),
    }
}

#[test]
fn scenario_6_descriptor_evaluator_existential_over_submodel_descriptors() {
    let descriptor = json!({
        "submodelDescriptors": [
            { "idShort": "y" },
            { "idShort": "x" },
        ]
    });
    let expr = eq_field("$smdesc#idShort", "x");
    let result = evaluate(&expr, &descriptor).unwrap();
    assert!(result.matched);
    assert_eq!(result.satisfying_indices, vec![vec![1]]);

    let no_match = eq_field("$smdesc#idShort", "z");
    assert!(!evaluate(&no_match, &descriptor).unwrap().matched);
}
