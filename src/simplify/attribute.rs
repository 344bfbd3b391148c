//! The attribute resolver Φ (spec §4.3, §9 "Runtime-typed AttributeValue").
//!
//! Spec §9 asks for `AttributeValue` to be "surfaced as an interface with
//! methods `asString`, `asNumber`, `asBool`, `asTime`, and a structured
//! `global("GLOBAL")` hook" — [`AttributeValue`] and
//! [`AttributeResolver::global`] are that interface. A caller backing claims
//! with already-typed data can override the typed accessors directly; one
//! backed only by strings needs to implement `as_string` alone and let
//! [`promote`] do the hex→datetime→time→number→string promotion spec §4.3
//! specifies.

use chrono::{DateTime, FixedOffset, NaiveTime};

use crate::ast::{AttributeRef, DateTimeValue, HexValue, TimeValue, Value};
use crate::error::Result;

/// A single resolved attribute value, as handed back by the caller's Φ.
pub trait AttributeValue {
    fn as_string(&self) -> String;

    fn as_number(&self) -> Option<f64> {
        None
    }

    fn as_bool(&self) -> Option<bool> {
        None
    }

    fn as_time(&self) -> Option<NaiveTime> {
        None
    }

    fn as_datetime(&self) -> Option<DateTime<FixedOffset>> {
        None
    }
}

impl AttributeValue for String {
    fn as_string(&self) -> String {
        self.clone()
    }
}

/// The caller-supplied attribute resolver, Φ in spec §4.3. Implementations
/// must be pure for the lifetime of a single compile call (spec §5
/// Determinism).
pub trait AttributeResolver {
    fn resolve(&self, attr: &AttributeRef) -> Result<Box<dyn AttributeValue>>;

    /// Resolves one of `UTCNOW`/`LOCALNOW`/`CLIENTNOW` (spec §3, §4.2) to a
    /// concrete instant. Only called when [`AttributeRef::is_global_now`]
    /// is true.
    fn global(&self, name: &str) -> Result<DateTime<FixedOffset>>;
}

/// `Φ(attr)` promoted to a literal [`Value`] (spec §4.3): global-now names
/// resolve straight to a datetime; everything else consults the typed
/// accessors first, falling back to the string promotion order
/// hex → datetime → time → number → string.
pub fn promote(resolver: &dyn AttributeResolver, attr: &AttributeRef) -> Result<Value> {
    if attr.is_global_now() {
        let dt = resolver.global(&attr.0)?;
        return Ok(Value::DateTimeVal(DateTimeValue(dt)));
    }

    let resolved = resolver.resolve(attr)?;

    if let Some(b) = resolved.as_bool() {
        return Ok(Value::Boolean(b));
    }
    if let Some(dt) = resolved.as_datetime() {
        return Ok(Value::DateTimeVal(DateTimeValue(dt)));
    }
    if let Some(t) = resolved.as_time() {
        return Ok(Value::TimeVal(TimeValue(t)));
    }
    if let Some(n) = resolved.as_number() {
        return Ok(Value::NumVal(n));
    }

    let s = resolved.as_string();
    if let Ok(hex) = HexValue::parse(&s) {
        return Ok(Value::HexVal(hex));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Ok(Value::DateTimeVal(DateTimeValue(dt)));
    }
    if let Ok(t) = NaiveTime::parse_from_str(&s, "%H:%M:%S").or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M")) {
        return Ok(Value::TimeVal(TimeValue(t)));
    }
    if let Ok(n) = s.parse::<f64>() {
        return Ok(Value::NumVal(n));
    }
    Ok(Value::StrVal(s))
}
