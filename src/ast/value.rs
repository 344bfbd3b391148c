//! Value AST & type kinds (spec §3, §4.2 — component C2).
//!
//! A single discriminated enum per the design note in spec §9: "use a single
//! discriminated variant" rather than replicate the optional-slot style of
//! the source grammar.

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset, NaiveTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Hexadecimal literal, normalized to uppercase digits with the `16#` prefix
/// stripped. Compared as an arbitrary-precision unsigned integer (spec §6):
/// no numeric crate is pulled in for this — magnitude compares by digit
/// count once leading zeros are stripped, then lexicographically, which is
/// exactly big-integer ordering for non-negative hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct HexValue(pub String);

impl HexValue {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.len() < 3 || !raw[..3].eq_ignore_ascii_case("16#") {
            return Err(Error::parse(format!("hex literal {raw:?} must start with `16#`")));
        }
        let digits = &raw[3..];
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::parse(format!("invalid hex literal {raw:?}")));
        }
        Ok(HexValue(digits.to_ascii_uppercase()))
    }

    fn normalized_magnitude(&self) -> &str {
        self.0.trim_start_matches('0')
    }
}

impl PartialOrd for HexValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HexValue {
    fn cmp(&self, other: &Self) -> Ordering {
        let a = self.normalized_magnitude();
        let b = other.normalized_magnitude();
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    }
}

impl<'de> Deserialize<'de> for HexValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        HexValue::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// RFC 3339 datetime literal (spec §6 "Literal patterns").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, JsonSchema)]
pub struct DateTimeValue(#[schemars(with = "String")] pub DateTime<FixedOffset>);

impl<'de> Deserialize<'de> for DateTimeValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(DateTimeValue)
            .map_err(serde::de::Error::custom)
    }
}

/// `HH:MM[:SS]` 24-hour time literal (spec §6 "Literal patterns").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, JsonSchema)]
pub struct TimeValue(#[schemars(with = "String")] pub NaiveTime);

impl<'de> Deserialize<'de> for TimeValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let parsed = NaiveTime::parse_from_str(&raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M"))
            .map_err(serde::de::Error::custom)?;
        Ok(TimeValue(parsed))
    }
}

/// A reference to a request-side named value: a claim, or a well-known
/// global constant (`UTCNOW`, `LOCALNOW`, `CLIENTNOW`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AttributeRef(pub String);

pub const GLOBAL_NOW_NAMES: [&str; 3] = ["UTCNOW", "LOCALNOW", "CLIENTNOW"];

impl AttributeRef {
    pub fn is_global_now(&self) -> bool {
        GLOBAL_NOW_NAMES.contains(&self.0.as_str())
    }
}

/// A reference to a field path into the relational data model (spec §3
/// "Field reference grammar"). The raw path is carried verbatim; tokenizing
/// and normalization happen in [`crate::path`] and [`crate::resolve`], kept
/// out of the AST so that the AST stays a pure data type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FieldRef(pub String);

/// Closed set of comparison kinds (spec §3 "ComparisonKind").
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, strum::Display,
)]
pub enum ComparisonKind {
    Unknown,
    String,
    Field,
    Number,
    Bool,
    DateTime,
    Time,
    Hex,
}

/// Tagged value: literal, reference, or cast wrapper. Exactly one
/// discriminant is populated, matching spec §3's "at most one of" invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, enum_as_inner::EnumAsInner)]
pub enum Value {
    #[serde(rename = "$strVal")]
    StrVal(String),
    #[serde(rename = "$numVal")]
    NumVal(f64),
    #[serde(rename = "$boolean")]
    Boolean(bool),
    #[serde(rename = "$hexVal")]
    HexVal(HexValue),
    #[serde(rename = "$dateTimeVal")]
    DateTimeVal(DateTimeValue),
    #[serde(rename = "$timeVal")]
    TimeVal(TimeValue),
    #[serde(rename = "$year")]
    Year(i32),
    #[serde(rename = "$month")]
    Month(u32),
    #[serde(rename = "$dayOfMonth")]
    DayOfMonth(u32),
    #[serde(rename = "$dayOfWeek")]
    DayOfWeek(u32),

    #[serde(rename = "$field")]
    Field(FieldRef),
    #[serde(rename = "$attribute")]
    Attribute(AttributeRef),

    #[serde(rename = "$strCast")]
    StrCast(Box<Value>),
    #[serde(rename = "$numCast")]
    NumCast(Box<Value>),
    #[serde(rename = "$boolCast")]
    BoolCast(Box<Value>),
    #[serde(rename = "$timeCast")]
    TimeCast(Box<Value>),
    #[serde(rename = "$dateTimeCast")]
    DateTimeCast(Box<Value>),
    #[serde(rename = "$hexCast")]
    HexCast(Box<Value>),
}

/// Restricted [`Value`] carrying only the variants valid for string
/// operators (spec §3 "StringValue").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, enum_as_inner::EnumAsInner)]
pub enum StringValue {
    #[serde(rename = "$strVal")]
    StrVal(String),
    #[serde(rename = "$field")]
    Field(FieldRef),
    #[serde(rename = "$attribute")]
    Attribute(AttributeRef),
    #[serde(rename = "$strCast")]
    StrCast(Box<Value>),
}

impl From<StringValue> for Value {
    fn from(sv: StringValue) -> Self {
        match sv {
            StringValue::StrVal(s) => Value::StrVal(s),
            StringValue::Field(f) => Value::Field(f),
            StringValue::Attribute(a) => Value::Attribute(a),
            StringValue::StrCast(v) => Value::StrCast(v),
        }
    }
}

impl Value {
    /// `kind(v) → ComparisonKind` (spec §4.2).
    pub fn kind(&self) -> ComparisonKind {
        match self {
            Value::StrVal(_) => ComparisonKind::String,
            Value::NumVal(_) | Value::Year(_) | Value::Month(_) | Value::DayOfMonth(_) | Value::DayOfWeek(_) => {
                ComparisonKind::Number
            }
            Value::Boolean(_) => ComparisonKind::Bool,
            Value::HexVal(_) => ComparisonKind::Hex,
            Value::DateTimeVal(_) => ComparisonKind::DateTime,
            Value::TimeVal(_) => ComparisonKind::Time,
            Value::Field(_) => ComparisonKind::Field,
            Value::Attribute(a) => {
                if a.is_global_now() {
                    ComparisonKind::DateTime
                } else {
                    ComparisonKind::String
                }
            }
            Value::StrCast(_) => ComparisonKind::String,
            Value::NumCast(_) => ComparisonKind::Number,
            Value::BoolCast(_) => ComparisonKind::Bool,
            Value::TimeCast(_) => ComparisonKind::Time,
            Value::DateTimeCast(_) => ComparisonKind::DateTime,
            Value::HexCast(_) => ComparisonKind::Hex,
        }
    }

    /// `comparableTo(v, w) → (Kind, error)` (spec §4.2). Two operands are
    /// comparable when both resolve to the same kind, or when exactly one is
    /// `Field` (the field adopts the other's kind).
    pub fn comparable_to(&self, other: &Value) -> Result<ComparisonKind> {
        let (a, b) = (self.kind(), other.kind());
        match (a, b) {
            (ComparisonKind::Field, ComparisonKind::Field) => Ok(ComparisonKind::Field),
            (ComparisonKind::Field, k) | (k, ComparisonKind::Field) => Ok(k),
            (a, b) if a == b => Ok(a),
            (a, b) => Err(Error::type_mismatch(format!(
                "cannot compare {a} with {b}"
            ))),
        }
    }

    /// `wrapFieldCast(v, k)` (spec §4.2): if `v` is a bare field, return the
    /// appropriate cast wrapper matching `k`; otherwise identity.
    pub fn wrap_field_cast(self, kind: ComparisonKind) -> Value {
        if !self.is_field() {
            return self;
        }
        match kind {
            ComparisonKind::String => Value::StrCast(Box::new(self)),
            ComparisonKind::Number => Value::NumCast(Box::new(self)),
            ComparisonKind::Bool => Value::BoolCast(Box::new(self)),
            ComparisonKind::Time => Value::TimeCast(Box::new(self)),
            ComparisonKind::DateTime => Value::DateTimeCast(Box::new(self)),
            ComparisonKind::Hex => Value::HexCast(Box::new(self)),
            ComparisonKind::Field | ComparisonKind::Unknown => self,
        }
    }

    /// True if this value carries no `Field`/`Attribute` anywhere (so it is
    /// already a literal, possibly wrapped in casts around another literal —
    /// though casts only ever wrap fields/attributes in well-formed input).
    pub fn is_literal(&self) -> bool {
        match self {
            Value::Field(_) | Value::Attribute(_) => false,
            Value::StrCast(v)
            | Value::NumCast(v)
            | Value::BoolCast(v)
            | Value::TimeCast(v)
            | Value::DateTimeCast(v)
            | Value::HexCast(v) => v.is_literal(),
            _ => true,
        }
    }

    /// The innermost non-cast value. Casts may nest; only the outermost
    /// defines the effective type (spec §3), but comparisons/evaluation need
    /// to reach the payload underneath.
    pub fn strip_casts(&self) -> &Value {
        match self {
            Value::StrCast(v)
            | Value::NumCast(v)
            | Value::BoolCast(v)
            | Value::TimeCast(v)
            | Value::DateTimeCast(v)
            | Value::HexCast(v) => v.strip_casts(),
            other => other,
        }
    }
}
