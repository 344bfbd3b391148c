//! Dialect-neutral predicate tree & compiled output (spec §6 "Compiled
//! output", component C6).

use chrono::{DateTime, FixedOffset, NaiveTime};

use crate::ast::CompareOp;
use crate::resolve::ResolvedJoin;

/// A join crossed while reaching a field's column, reused verbatim from the
/// resolver (both are already dialect-neutral `table`/`alias`/`on_left`/
/// `on_right` tuples).
pub type JoinClause = ResolvedJoin;

/// A bound parameter. The caller's SQL renderer is responsible for binding
/// these as native types (spec §6 "indices are bound as integers,
/// string/hex/time/datetime literals as their native types").
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Time(NaiveTime),
    DateTime(DateTime<FixedOffset>),
}

/// A scalar operand inside a rendered comparison: either a column reference
/// (optionally cast) or a bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlExpr {
    Column(String),
    Param(ParamValue),
    /// `sql_type` is e.g. `"double precision"`, `"boolean"`, `"time"`,
    /// `"timestamptz"`, `"text"`. `guarded` selects between a bare `::type`
    /// cast and the regex-guarded `CASE WHEN … THEN …::type END` form (spec
    /// §4.5 step 2).
    Cast {
        inner: Box<SqlExpr>,
        sql_type: &'static str,
        guarded: bool,
    },
}

/// The dialect-neutral predicate tree (spec §6).
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Boolean(bool),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Compare {
        op: CompareOp,
        left: SqlExpr,
        right: SqlExpr,
    },
    Like {
        column: SqlExpr,
        pattern: ParamValue,
    },
    Regex {
        column: SqlExpr,
        pattern: ParamValue,
    },
    /// `outerAlias.flag<k> IS TRUE` (spec §4.5 step 3) — a reference to a
    /// flag column produced by a flag CTE.
    FlagRef {
        cte_alias: String,
        flag_alias: String,
    },
    /// The legacy lowering path (spec §9 Open Question): `EXISTS(SELECT 1
    /// FROM …joins… WHERE positionBindings AND predicate)`.
    Exists {
        base: JoinClause,
        joins: Vec<JoinClause>,
        where_predicate: Box<Predicate>,
    },
}

/// One flag column inside a [`CteSpec`] (spec §6).
#[derive(Debug, Clone, PartialEq)]
pub struct FlagColumn {
    pub alias: String,
    pub predicate: Predicate,
}

/// `{alias, base, joins, where?, groupBy=root_id, flags: […]}` (spec §4.5,
/// §6). `base` is the first join crossed from the outer query's anchor row;
/// its `on_right` column is the FK that correlates this CTE's grouped rows
/// back to the anchor (spec §4.5 "root_id is the FK column of base back to
/// the outer query's anchor").
#[derive(Debug, Clone, PartialEq)]
pub struct CteSpec {
    pub alias: String,
    pub base: JoinClause,
    pub joins: Vec<JoinClause>,
    pub where_predicate: Option<Predicate>,
    pub group_by: String,
    pub flags: Vec<FlagColumn>,
}

/// Everything a caller's SQL renderer needs (spec §6 "Compiled output").
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub predicate: Predicate,
    pub ctes: Vec<CteSpec>,
    /// Non-fatal diagnostics (spec §7 `OperatorDomainError` fallback, §4.6
    /// `$match` demotion) surfaced alongside `log::warn!` for callers with
    /// no logger configured.
    pub warnings: Vec<String>,
}
