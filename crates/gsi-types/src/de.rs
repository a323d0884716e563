//! Serde helpers for GSI wire quirks.
//!
//! - Ordered sequences are sent as objects keyed by an index (`"1"`, `"2"`,
//!   ... or `"weapon_0"`, `"weapon_1"`, ...). [`ordered_by_index`] sorts them
//!   numerically on the trailing index and drops the keys.
//! - Some durations are sent as decimal strings (`"phase_ends_in": "12.3"`).
//!   [`lenient_f64_opt`] accepts either a string or a JSON number.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

/// Extract the trailing decimal index of a map key (`"12"` or `"weapon_3"`).
pub fn trailing_index(key: &str) -> Option<u64> {
    let prefix = key.trim_end_matches(|c: char| c.is_ascii_digit());
    key.get(prefix.len()..)
        .filter(|digits| !digits.is_empty())
        .and_then(|digits| digits.parse().ok())
}

/// Deserialize an index-keyed object into a list ordered by index.
///
/// Keys are compared numerically, so `"10"` sorts after `"9"`. A key
/// without a trailing index fails the decode.
///
/// # Errors
///
/// Returns an error if the value is not an object, a key has no trailing
/// index, or an element fails to decode.
pub fn ordered_by_index<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let entries = BTreeMap::<String, T>::deserialize(deserializer)?;
    let mut indexed = entries
        .into_iter()
        .map(|(key, value)| {
            trailing_index(&key)
                .map(|index| (index, value))
                .ok_or_else(|| {
                    <D::Error as de::Error>::custom(format!("map key {key:?} has no numeric index"))
                })
        })
        .collect::<Result<Vec<_>, D::Error>>()?;
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, value)| value).collect())
}

/// Deserialize an optional float that may be sent as a string or a number.
///
/// # Errors
///
/// Returns an error if a string is present but does not parse as a float.
pub fn lenient_f64_opt<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(LenientF64)
}

struct LenientF64;

impl<'de> Visitor<'de> for LenientF64 {
    type Value = Option<f64>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number or a numeric string")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed
            .parse::<f64>()
            .ok()
            .map(Some)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}
