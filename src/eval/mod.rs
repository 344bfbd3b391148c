//! Descriptor evaluator (spec §4.7 — component C8).

pub mod descriptor;

pub use descriptor::{evaluate, DescriptorEvaluation};
