//! Path tokenizer (spec §4.1 — component C1).

pub mod tokenizer;

pub use tokenizer::{tokenize, ArrayIndex, Token};
