//! Resolve contexts, mapping tables, and the field path resolver
//! (spec §3, §4.4 — components C3, C4).

pub mod context;
pub mod mappings;
pub mod resolver;

pub use context::ResolveContext;
pub use mappings::{ArraySegmentEntry, ArraySegmentMapping, JoinStep, TerminalColumnMapping};
pub use resolver::{resolve_field_path, ArrayBinding, ResolvedFieldPath, ResolvedJoin};
