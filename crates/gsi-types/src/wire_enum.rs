//! Forward-compatible decoding of enumerated wire values.
//!
//! The game introduces new enum values without notice. Every enumerated
//! field is therefore decoded into a [`ResolvedOrRaw`], which always keeps
//! the original wire string and additionally carries the matched variant
//! when the string belongs to the known vocabulary. An unknown value never
//! fails the surrounding decode.

use core::fmt;
use core::marker::PhantomData;

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

/// An enumeration with a fixed table of accepted wire spellings.
///
/// Implemented by the `wire_enum!` macro in [`crate::enums`]; the table is
/// the only source of truth for matching, so no runtime type inspection is
/// involved.
pub trait WireEnum: Copy + PartialEq + fmt::Debug + 'static {
    /// Accepted wire spellings paired with their variant.
    ///
    /// A variant may appear more than once to cover alternate spellings.
    /// The first entry for a variant is its canonical spelling.
    const WIRE_TABLE: &'static [(&'static str, Self)];

    /// Resolve a wire string against the table.
    ///
    /// Exact matches win; otherwise an ASCII case-insensitive match is
    /// accepted. Surrounding whitespace is ignored for matching.
    fn from_wire(raw: &str) -> Option<Self> {
        let needle = raw.trim();
        Self::WIRE_TABLE
            .iter()
            .find(|(wire, _)| *wire == needle)
            .or_else(|| {
                Self::WIRE_TABLE
                    .iter()
                    .find(|(wire, _)| wire.eq_ignore_ascii_case(needle))
            })
            .map(|(_, variant)| *variant)
    }

    /// The canonical wire spelling of this variant.
    fn wire_name(self) -> &'static str {
        Self::WIRE_TABLE
            .iter()
            .find(|(_, variant)| *variant == self)
            .map_or("", |(wire, _)| wire)
    }
}

/// A decoded enumerated field that retains its original wire string.
///
/// `raw` is always present. `matched` is set only when `raw` resolved to a
/// known variant of `E`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedOrRaw<E> {
    matched: Option<E>,
    raw: String,
}

impl<E: WireEnum> ResolvedOrRaw<E> {
    /// Decode a wire string, resolving it against `E`'s table.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            matched: E::from_wire(&raw),
            raw,
        }
    }

    /// Build a resolved value from a known variant using its canonical spelling.
    pub fn known(variant: E) -> Self {
        Self {
            matched: Some(variant),
            raw: variant.wire_name().to_owned(),
        }
    }

    /// The matched variant, if the wire string is part of the known vocabulary.
    pub fn matched(&self) -> Option<E> {
        self.matched
    }

    /// The wire string exactly as received.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether the wire string resolved to a known variant.
    pub const fn is_resolved(&self) -> bool {
        self.matched.is_some()
    }

    /// Whether this value resolved to `variant`.
    pub fn is(&self, variant: E) -> bool {
        self.matched == Some(variant)
    }
}

impl<E> fmt::Display for ResolvedOrRaw<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl<'de, E: WireEnum> Deserialize<'de> for ResolvedOrRaw<E> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(RawVisitor(PhantomData))
    }
}

/// Accepts any scalar and keeps its textual form.
///
/// Compound values are not expected here; they are kept as compact JSON so
/// that an odd payload still never fails the whole decode.
struct RawVisitor<E>(PhantomData<E>);

impl<'de, E: WireEnum> Visitor<'de> for RawVisitor<E> {
    type Value = ResolvedOrRaw<E>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an enumerated wire value")
    }

    fn visit_str<Er: de::Error>(self, v: &str) -> Result<Self::Value, Er> {
        Ok(ResolvedOrRaw::from_raw(v))
    }

    fn visit_string<Er: de::Error>(self, v: String) -> Result<Self::Value, Er> {
        Ok(ResolvedOrRaw::from_raw(v))
    }

    fn visit_bool<Er: de::Error>(self, v: bool) -> Result<Self::Value, Er> {
        Ok(ResolvedOrRaw::from_raw(v.to_string()))
    }

    fn visit_i64<Er: de::Error>(self, v: i64) -> Result<Self::Value, Er> {
        Ok(ResolvedOrRaw::from_raw(v.to_string()))
    }

    fn visit_u64<Er: de::Error>(self, v: u64) -> Result<Self::Value, Er> {
        Ok(ResolvedOrRaw::from_raw(v.to_string()))
    }

    fn visit_f64<Er: de::Error>(self, v: f64) -> Result<Self::Value, Er> {
        Ok(ResolvedOrRaw::from_raw(v.to_string()))
    }

    fn visit_unit<Er: de::Error>(self) -> Result<Self::Value, Er> {
        Ok(ResolvedOrRaw::from_raw("null"))
    }

    fn visit_seq<A>(self, seq: A) -> Result<Self::Value, A::Error>
    where
        A: de::SeqAccess<'de>,
    {
        let value = serde_json::Value::deserialize(de::value::SeqAccessDeserializer::new(seq))?;
        Ok(ResolvedOrRaw::from_raw(value.to_string()))
    }

    fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
    where
        A: de::MapAccess<'de>,
    {
        let value = serde_json::Value::deserialize(de::value::MapAccessDeserializer::new(map))?;
        Ok(ResolvedOrRaw::from_raw(value.to_string()))
    }
}
