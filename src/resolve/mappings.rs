//! Mapping tables (spec §3 "Mapping tables", component C3).
//!
//! Declared as static data rather than code switches, per the design note in
//! spec §9 ("add a new field root" should be a data-only change). Every
//! column/join template contains the literal placeholder `{base}`, which
//! [`crate::resolve::resolver`] substitutes with whichever table alias is
//! currently active in the walk (the root alias, or the alias of the most
//! recently joined table).

use std::collections::HashMap;
use std::sync::OnceLock;

use super::context::ResolveContext;

#[derive(Debug, Clone, Copy)]
pub struct JoinStep {
    pub table: &'static str,
    pub alias: &'static str,
    /// `{base}`-templated column on the table active before this join.
    pub on_left: &'static str,
    /// Column on this join's own alias.
    pub on_right: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct ArraySegmentMapping {
    pub joins: &'static [JoinStep],
    pub next_context: ResolveContext,
    /// `{base}`-templated position column, evaluated against the alias of
    /// the last join in `joins` (or the incoming base, if `joins` is empty).
    pub position_column: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct ArraySegmentEntry {
    pub default: Option<ArraySegmentMapping>,
    pub by_context: &'static [(ResolveContext, ArraySegmentMapping)],
    pub by_prev_simple: &'static [(&'static str, ArraySegmentMapping)],
}

impl ArraySegmentEntry {
    /// Pick a mapping for this occurrence. `by_prev_simple` is the most
    /// specific disambiguator (spec's "keys under externalSubjectId vs under
    /// semanticId" example); `by_context` disambiguates occurrences of the
    /// same array name reached from different starting contexts (e.g.
    /// `endpoints` under `$aasdesc` directly vs. nested under
    /// `submodelDescriptors[]`); `default` is the fallback.
    pub fn resolve(
        &self,
        context: ResolveContext,
        prev_simple: Option<&str>,
    ) -> Option<ArraySegmentMapping> {
        if let Some(prev) = prev_simple {
            if let Some((_, m)) = self.by_prev_simple.iter().find(|(name, _)| *name == prev) {
                return Some(*m);
            }
        }
        if let Some((_, m)) = self.by_context.iter().find(|(ctx, _)| *ctx == context) {
            return Some(*m);
        }
        self.default
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TerminalColumnMapping {
    pub by_array_parent_and_parent_simple_and_context:
        &'static [((&'static str, &'static str, ResolveContext), &'static str)],
    pub by_parent_simple_and_context: &'static [((&'static str, ResolveContext), &'static str)],
    pub by_context: &'static [(ResolveContext, &'static str)],
}

impl TerminalColumnMapping {
    /// Pick the column template for the most specific of (arrayParent +
    /// parentSimple + context), (parentSimple + context), (context) — spec
    /// §4.4.
    pub fn resolve(
        &self,
        context: ResolveContext,
        prev_simple: Option<&str>,
        prev_array_name: Option<&str>,
    ) -> Option<&'static str> {
        if let (Some(array), Some(simple)) = (prev_array_name, prev_simple) {
            if let Some((_, col)) = self
                .by_array_parent_and_parent_simple_and_context
                .iter()
                .find(|((a, s, c), _)| *a == array && *s == simple && *c == context)
            {
                return Some(col);
            }
        }
        if let Some(simple) = prev_simple {
            if let Some((_, col)) = self
                .by_parent_simple_and_context
                .iter()
                .find(|((s, c), _)| *s == simple && *c == context)
            {
                return Some(col);
            }
        }
        self.by_context
            .iter()
            .find(|(c, _)| *c == context)
            .map(|(_, col)| *col)
    }
}

use ResolveContext::*;

const SUBMODEL_DESCRIPTORS: ArraySegmentMapping = ArraySegmentMapping {
    joins: &[JoinStep {
        table: "submodel_descriptor",
        alias: "submodel_descriptor",
        on_left: "{base}.id",
        on_right: "submodel_descriptor.aas_descriptor_id",
    }],
    next_context: SMDesc,
    position_column: "submodel_descriptor.position",
};

const SPECIFIC_ASSET_IDS: ArraySegmentMapping = ArraySegmentMapping {
    joins: &[JoinStep {
        table: "specific_asset_id",
        alias: "specific_asset_id",
        on_left: "{base}.id",
        on_right: "specific_asset_id.aas_descriptor_id",
    }],
    next_context: SpecificAssetID,
    position_column: "specific_asset_id.position",
};

const ENDPOINTS_ON_AASDESC: ArraySegmentMapping = ArraySegmentMapping {
    joins: &[JoinStep {
        table: "endpoint",
        alias: "endpoint",
        on_left: "{base}.id",
        on_right: "endpoint.aas_descriptor_id",
    }],
    next_context: AASDescEndpoint,
    position_column: "endpoint.position",
};

const ENDPOINTS_ON_SMDESC: ArraySegmentMapping = ArraySegmentMapping {
    joins: &[JoinStep {
        table: "endpoint",
        alias: "endpoint",
        on_left: "{base}.id",
        on_right: "endpoint.submodel_descriptor_id",
    }],
    next_context: SubmodelDescriptorEndpoint,
    position_column: "endpoint.position",
};

const KEYS_UNDER_EXTERNAL_SUBJECT_ID: ArraySegmentMapping = ArraySegmentMapping {
    joins: &[
        JoinStep {
            table: "reference",
            alias: "external_subject_reference",
            on_left: "{base}.external_subject_id",
            on_right: "external_subject_reference.id",
        },
        JoinStep {
            table: "reference_key",
            alias: "external_subject_reference_key",
            on_left: "external_subject_reference.id",
            on_right: "external_subject_reference_key.reference_id",
        },
    ],
    // Context is unchanged: "value"/"type" after this array are
    // disambiguated by (arrayParent="keys", parentSimple="externalSubjectId")
    // rather than by a dedicated context (spec §3 lists no reference-key
    // context; see TERMINAL_VALUE/TERMINAL_TYPE below).
    next_context: SpecificAssetID,
    position_column: "external_subject_reference_key.position",
};

const KEYS_UNDER_SEMANTIC_ID_SM: ArraySegmentMapping = ArraySegmentMapping {
    joins: &[
        JoinStep {
            table: "reference",
            alias: "semantic_id_reference",
            on_left: "{base}.semantic_id",
            on_right: "semantic_id_reference.id",
        },
        JoinStep {
            table: "reference_key",
            alias: "semantic_id_reference_key",
            on_left: "semantic_id_reference.id",
            on_right: "semantic_id_reference_key.reference_id",
        },
    ],
    next_context: SM,
    position_column: "semantic_id_reference_key.position",
};

const KEYS_UNDER_SEMANTIC_ID_SME: ArraySegmentMapping = ArraySegmentMapping {
    joins: &[
        JoinStep {
            table: "reference",
            alias: "semantic_id_reference",
            on_left: "{base}.semantic_id",
            on_right: "semantic_id_reference.id",
        },
        JoinStep {
            table: "reference_key",
            alias: "semantic_id_reference_key",
            on_left: "semantic_id_reference.id",
            on_right: "semantic_id_reference_key.reference_id",
        },
    ],
    next_context: SME,
    position_column: "semantic_id_reference_key.position",
};

/// `arraySegmentMappings` (spec §3).
pub fn array_segment_mappings() -> &'static HashMap<&'static str, ArraySegmentEntry> {
    static TABLE: OnceLock<HashMap<&'static str, ArraySegmentEntry>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut m = HashMap::new();
        m.insert(
            "submodelDescriptors",
            ArraySegmentEntry {
                default: Some(SUBMODEL_DESCRIPTORS),
                by_context: &[],
                by_prev_simple: &[],
            },
        );
        m.insert(
            "specificAssetIds",
            ArraySegmentEntry {
                default: Some(SPECIFIC_ASSET_IDS),
                by_context: &[],
                by_prev_simple: &[],
            },
        );
        m.insert(
            "endpoints",
            ArraySegmentEntry {
                default: None,
                by_context: &[(AASDesc, ENDPOINTS_ON_AASDESC), (SMDesc, ENDPOINTS_ON_SMDESC)],
                by_prev_simple: &[],
            },
        );
        m.insert(
            "keys",
            ArraySegmentEntry {
                default: None,
                by_context: &[],
                by_prev_simple: &[
                    ("externalSubjectId", KEYS_UNDER_EXTERNAL_SUBJECT_ID),
                    ("semanticId", KEYS_UNDER_SEMANTIC_ID_SM),
                ],
            },
        );
        m
    })
}

/// Look up the `keys` mapping for a submodel element's `semanticId`
/// specifically — distinguished from `KEYS_UNDER_SEMANTIC_ID_SM` by the
/// *current* context, which `by_prev_simple` alone can't express since both
/// resolve through the same `(array="keys", prevSimple="semanticId")` pair.
/// The resolver calls this when `context == SME` before falling back to
/// [`array_segment_mappings`].
pub fn keys_under_semantic_id_for_context(context: ResolveContext) -> Option<ArraySegmentMapping> {
    match context {
        SME => Some(KEYS_UNDER_SEMANTIC_ID_SME),
        SM => Some(KEYS_UNDER_SEMANTIC_ID_SM),
        _ => None,
    }
}

const TERMINAL_VALUE_UNDER_REFERENCE_KEY_EXTERNAL: (&str, &str, ResolveContext, &str) = (
    "keys",
    "externalSubjectId",
    SpecificAssetID,
    "{base}.value",
);

const TERMINAL_TYPE_UNDER_REFERENCE_KEY_EXTERNAL: (&str, &str, ResolveContext, &str) = (
    "keys",
    "externalSubjectId",
    SpecificAssetID,
    "{base}.type",
);

fn terminal_table() -> &'static HashMap<&'static str, TerminalColumnMapping> {
    static TABLE: OnceLock<HashMap<&'static str, TerminalColumnMapping>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut m = HashMap::new();

        m.insert(
            "idShort",
            TerminalColumnMapping {
                by_array_parent_and_parent_simple_and_context: &[],
                by_parent_simple_and_context: &[],
                by_context: &[
                    (AASDesc, "{base}.id_short"),
                    (SMDesc, "{base}.id_short"),
                    (SM, "{base}.id_short"),
                    (SME, "{base}.id_short"),
                ],
            },
        );
        m.insert(
            "id",
            TerminalColumnMapping {
                by_array_parent_and_parent_simple_and_context: &[],
                by_parent_simple_and_context: &[],
                by_context: &[
                    (AASDesc, "{base}.id"),
                    (SMDesc, "{base}.id"),
                    (SM, "{base}.id"),
                ],
            },
        );
        m.insert(
            "globalAssetId",
            TerminalColumnMapping {
                by_array_parent_and_parent_simple_and_context: &[],
                by_parent_simple_and_context: &[],
                by_context: &[(AASDesc, "{base}.global_asset_id")],
            },
        );
        m.insert(
            "href",
            TerminalColumnMapping {
                by_array_parent_and_parent_simple_and_context: &[],
                by_parent_simple_and_context: &[
                    (("protocolInformation", AASDescEndpoint), "{base}.href"),
                    (
                        ("protocolInformation", SubmodelDescriptorEndpoint),
                        "{base}.href",
                    ),
                ],
                by_context: &[],
            },
        );
        m.insert(
            "endpointProtocol",
            TerminalColumnMapping {
                by_array_parent_and_parent_simple_and_context: &[],
                by_parent_simple_and_context: &[
                    (
                        ("protocolInformation", AASDescEndpoint),
                        "{base}.endpoint_protocol",
                    ),
                    (
                        ("protocolInformation", SubmodelDescriptorEndpoint),
                        "{base}.endpoint_protocol",
                    ),
                ],
                by_context: &[],
            },
        );
        m.insert(
            "name",
            TerminalColumnMapping {
                by_array_parent_and_parent_simple_and_context: &[],
                by_parent_simple_and_context: &[],
                by_context: &[(SpecificAssetID, "{base}.name")],
            },
        );
        m.insert(
            "value",
            TerminalColumnMapping {
                by_array_parent_and_parent_simple_and_context: &[(
                    (
                        TERMINAL_VALUE_UNDER_REFERENCE_KEY_EXTERNAL.0,
                        TERMINAL_VALUE_UNDER_REFERENCE_KEY_EXTERNAL.1,
                        TERMINAL_VALUE_UNDER_REFERENCE_KEY_EXTERNAL.2,
                    ),
                    TERMINAL_VALUE_UNDER_REFERENCE_KEY_EXTERNAL.3,
                ), (
                    ("keys", "semanticId", SM),
                    "{base}.value",
                ), (
                    ("keys", "semanticId", SME),
                    "{base}.value",
                )],
                by_parent_simple_and_context: &[],
                by_context: &[
                    (SpecificAssetID, "{base}.value"),
                    (
                        SME,
                        "COALESCE({base}.value_text, {base}.value_num::text, \
                         {base}.value_bool::text, {base}.value_time::text, \
                         {base}.value_datetime::text)",
                    ),
                ],
            },
        );
        m.insert(
            "type",
            TerminalColumnMapping {
                by_array_parent_and_parent_simple_and_context: &[(
                    (
                        TERMINAL_TYPE_UNDER_REFERENCE_KEY_EXTERNAL.0,
                        TERMINAL_TYPE_UNDER_REFERENCE_KEY_EXTERNAL.1,
                        TERMINAL_TYPE_UNDER_REFERENCE_KEY_EXTERNAL.2,
                    ),
                    TERMINAL_TYPE_UNDER_REFERENCE_KEY_EXTERNAL.3,
                ), (
                    ("keys", "semanticId", SM),
                    "{base}.type",
                ), (
                    ("keys", "semanticId", SME),
                    "{base}.type",
                )],
                by_parent_simple_and_context: &[],
                by_context: &[],
            },
        );
        m
    })
}

/// `terminalColumnMappings` (spec §3).
pub fn terminal_column_mappings() -> &'static HashMap<&'static str, TerminalColumnMapping> {
    terminal_table()
}
