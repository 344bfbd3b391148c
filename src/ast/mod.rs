//! AST & type system (spec §3, §4.2 — component C2) plus the field
//! reference grammar (spec §3 "Field reference grammar").

pub mod expr;
pub mod field;
pub mod value;

pub use expr::{CompareOp, Expression, StringOp};
pub use field::{normalize_field, FieldRoot, NormalizedField};
pub use value::{AttributeRef, ComparisonKind, DateTimeValue, FieldRef, HexValue, StringValue, TimeValue, Value};
