//! The flag-CTE collector (spec §4.5 "Flag-CTE construction", component C6).
//!
//! A local builder, never shared across lowering passes (spec §5): it
//! accumulates predicates grouped by [`JoinGraphKey`], handing each
//! registration back a [`Predicate::FlagRef`] to splice into the outer
//! predicate tree.

use crate::ast::CompareOp;
use crate::path::ArrayIndex;
use crate::resolve::ArrayBinding;

use super::ast::{CteSpec, FlagColumn, JoinClause, ParamValue, Predicate, SqlExpr};
use super::cte::AliasAllocator;

/// Join graph identity used to decide whether two field predicates can share
/// one CTE (spec §9 "Join graph equality"): `(baseTable,
/// orderedListOf(joinTableAlias, onLeft, onRight), sortedSetOf(
/// positionAliases))`. Deliberately excludes the predicate itself — that is
/// how two predicates on sibling keys end up sharing a CTE.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinGraphKey {
    base_table: &'static str,
    joins: Vec<(&'static str, String, &'static str)>,
    position_columns: Vec<String>,
}

impl JoinGraphKey {
    pub fn new(joins: &[JoinClause], array_bindings: &[ArrayBinding]) -> Self {
        let base_table = joins.first().map(|j| j.table).unwrap_or("");
        let joins = joins
            .iter()
            .map(|j| (j.alias, j.on_left.clone(), j.on_right))
            .collect();
        let mut position_columns: Vec<String> =
            array_bindings.iter().map(|b| b.position_column.clone()).collect();
        position_columns.sort();
        JoinGraphKey {
            base_table,
            joins,
            position_columns,
        }
    }
}

struct CteGroup {
    key: JoinGraphKey,
    cte_alias: String,
    base: JoinClause,
    joins: Vec<JoinClause>,
    where_predicate: Option<Predicate>,
    group_by: String,
    flags: Vec<FlagColumn>,
    next_flag: u32,
}

impl CteGroup {
    fn next_flag_alias(&mut self) -> String {
        let alias = format!("flag_{}", self.next_flag);
        self.next_flag += 1;
        alias
    }
}

/// Accumulates flag-CTE groups across a single lowering pass.
pub struct Collector {
    alias_allocator: AliasAllocator,
    groups: Vec<CteGroup>,
}

impl Collector {
    pub fn new() -> Self {
        Collector {
            alias_allocator: AliasAllocator::new(),
            groups: Vec::new(),
        }
    }

    /// Register a resolved field predicate, folding in position predicates
    /// for any concrete `[n]` array bindings crossed along the way
    /// (wildcards contribute nothing, per spec §4.5). Returns the
    /// `Predicate::FlagRef` to splice into the outer predicate tree.
    pub fn register(
        &mut self,
        joins: Vec<JoinClause>,
        array_bindings: &[ArrayBinding],
        field_predicate: Predicate,
    ) -> Predicate {
        assert!(!joins.is_empty(), "collector registration requires at least one join");
        let key = JoinGraphKey::new(&joins, array_bindings);
        let combined = combine_with_position_predicates(array_bindings, field_predicate);

        let group_idx = match self.groups.iter().position(|g| g.key == key) {
            Some(i) => i,
            None => {
                let mut joins = joins;
                let base = joins.remove(0);
                let group_by = base.on_right.to_string();
                let cte_alias = self.alias_allocator.next_table_alias();
                log::debug!("flag CTE {cte_alias} grouping on {group_by}");
                self.groups.push(CteGroup {
                    key,
                    cte_alias,
                    base,
                    joins,
                    where_predicate: None,
                    group_by,
                    flags: Vec::new(),
                    next_flag: 1,
                });
                self.groups.len() - 1
            }
        };

        let group = &mut self.groups[group_idx];
        let flag_alias = match group.flags.iter().find(|f| f.predicate == combined) {
            Some(existing) => existing.alias.clone(),
            None => {
                let alias = group.next_flag_alias();
                log::debug!("flag CTE {} assigning {alias}", group.cte_alias);
                group.flags.push(FlagColumn {
                    alias: alias.clone(),
                    predicate: combined,
                });
                alias
            }
        };

        Predicate::FlagRef {
            cte_alias: group.cte_alias.clone(),
            flag_alias,
        }
    }

    /// Register a `$match` group's single `BOOL_OR` flag (spec §4.6). Unlike
    /// [`Self::register`], the join chain is the common array-token prefix
    /// shared by the match's children rather than one field's own path, and
    /// a static `restricting` predicate (the prefix's own concrete position
    /// bindings, if any) applies to every row the CTE groups, not just this
    /// one flag.
    pub fn register_match(
        &mut self,
        base: JoinClause,
        joins: Vec<JoinClause>,
        restricting: Option<Predicate>,
        predicate: Predicate,
    ) -> Predicate {
        let mut full_joins = vec![base.clone()];
        full_joins.extend(joins.clone());
        let key = JoinGraphKey::new(&full_joins, &[]);

        let group_idx = match self.groups.iter().position(|g| g.key == key) {
            Some(i) => i,
            None => {
                let group_by = base.on_right.to_string();
                let cte_alias = self.alias_allocator.next_table_alias();
                log::debug!("match CTE {cte_alias} grouping on {group_by}");
                self.groups.push(CteGroup {
                    key,
                    cte_alias,
                    base,
                    joins,
                    where_predicate: restricting,
                    group_by,
                    flags: Vec::new(),
                    next_flag: 1,
                });
                self.groups.len() - 1
            }
        };

        let group = &mut self.groups[group_idx];
        let flag_alias = match group.flags.iter().find(|f| f.predicate == predicate) {
            Some(existing) => existing.alias.clone(),
            None => {
                let alias = group.next_flag_alias();
                log::debug!("match CTE {} assigning {alias}", group.cte_alias);
                group.flags.push(FlagColumn {
                    alias: alias.clone(),
                    predicate,
                });
                alias
            }
        };

        Predicate::FlagRef {
            cte_alias: group.cte_alias.clone(),
            flag_alias,
        }
    }

    /// Finalize the collected groups into the ordered CTE specs that make up
    /// part of the compiled output (spec §6).
    pub fn into_ctes(self) -> Vec<CteSpec> {
        self.groups
            .into_iter()
            .map(|g| CteSpec {
                alias: g.cte_alias,
                base: g.base,
                joins: g.joins,
                where_predicate: g.where_predicate,
                group_by: g.group_by,
                flags: g.flags,
            })
            .collect()
    }
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

fn combine_with_position_predicates(array_bindings: &[ArrayBinding], predicate: Predicate) -> Predicate {
    let mut parts: Vec<Predicate> = array_bindings
        .iter()
        .filter_map(|b| match b.index {
            ArrayIndex::Int(n) => Some(Predicate::Compare {
                op: CompareOp::Eq,
                left: SqlExpr::Column(b.position_column.clone()),
                right: SqlExpr::Param(ParamValue::Int(n as i64)),
            }),
            ArrayIndex::Wildcard => None,
        })
        .collect();
    parts.push(predicate);
    if parts.len() == 1 {
        parts.into_iter().next().unwrap()
    } else {
        Predicate::And(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(table: &'static str, alias: &'static str, on_left: &str, on_right: &'static str) -> JoinClause {
        JoinClause {
            table,
            alias,
            on_left: on_left.to_string(),
            on_right,
        }
    }

    fn dummy_predicate(n: i64) -> Predicate {
        Predicate::Compare {
            op: CompareOp::Eq,
            left: SqlExpr::Column("specific_asset_id.name".into()),
            right: SqlExpr::Param(ParamValue::Int(n)),
        }
    }

    #[test]
    fn sibling_predicates_on_same_join_graph_share_one_cte_with_two_flags() {
        let mut collector = Collector::new();
        let joins = vec![join(
            "specific_asset_id",
            "specific_asset_id",
            "aas_descriptor.id",
            "specific_asset_id.aas_descriptor_id",
        )];

        let a = collector.register(joins.clone(), &[], dummy_predicate(1));
        let b = collector.register(joins, &[], dummy_predicate(2));

        match (a, b) {
            (Predicate::FlagRef { cte_alias: a_cte, flag_alias: a_flag }, Predicate::FlagRef { cte_alias: b_cte, flag_alias: b_flag }) => {
                assert_eq!(a_cte, b_cte);
                assert_ne!(a_flag, b_flag);
            }
            other => panic!("expected two FlagRefs, got {other:?}"),
        }

        let ctes = collector.into_ctes();
        assert_eq!(ctes.len(), 1);
        assert_eq!(ctes[0].flags.len(), 2);
    }

    #[test]
    fn reregistering_identical_predicate_reuses_alias() {
        let mut collector = Collector::new();
        let joins = vec![join(
            "specific_asset_id",
            "specific_asset_id",
            "aas_descriptor.id",
            "specific_asset_id.aas_descriptor_id",
        )];

        let a = collector.register(joins.clone(), &[], dummy_predicate(1));
        let b = collector.register(joins, &[], dummy_predicate(1));
        assert_eq!(a, b);
        assert_eq!(collector.into_ctes()[0].flags.len(), 1);
    }
}
