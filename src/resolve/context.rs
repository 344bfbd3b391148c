//! Resolve context (spec §3 "ResolveContext", component C3).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ast::FieldRoot;

/// Closed set of resolve contexts. Chosen from the field's root prefix, then
/// mutated as the tokenizer crosses an [`crate::path::Token::Array`] whose
/// mapping defines a context transition (spec §3, §4.4).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, strum::Display,
)]
pub enum ResolveContext {
    Unknown,
    AASDesc,
    SMDesc,
    SM,
    SME,
    BD,
    AASDescEndpoint,
    SubmodelDescriptorEndpoint,
    SubmodelDescriptor,
    SpecificAssetID,
}

impl ResolveContext {
    /// The context and base table alias a field reference starts from,
    /// given its normalized root (spec §4.4).
    pub fn initial(root: &FieldRoot) -> (ResolveContext, &'static str) {
        match root {
            FieldRoot::AasDesc => (ResolveContext::AASDesc, "aas_descriptor"),
            FieldRoot::SmDesc => (ResolveContext::SMDesc, "submodel_descriptor"),
            FieldRoot::Sm => (ResolveContext::SM, "submodel"),
            FieldRoot::Sme { .. } => (ResolveContext::SME, "submodel_element"),
            FieldRoot::Bd => (ResolveContext::BD, "business_data"),
        }
    }
}
