//! Packed 64-bit player identifiers and their textual encodings.
//!
//! A [`PlayerId`] is a single `u64`. The game transmits it as a decimal
//! string, and two older encodings can be recovered from the same value by
//! bit arithmetic alone:
//!
//! | Encoding | Example | Derivation |
//! |----------|---------|------------|
//! | Decimal | `76561197960265729` | the integer itself |
//! | Legacy | `STEAM_1:1:0` | universe = bits 56-63, parity = bit 0, account = bits 1-31 |
//! | Offset | `[U:1:1]` | integer minus [`OFFSET_BASE`] |
//!
//! Bits 32-55 of an individual account always hold [`INDIVIDUAL_MARKER`];
//! the legacy and offset forms are only defined for identifiers carrying it.
//! Within that domain every encoding round-trips losslessly.

use core::fmt;
use core::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

/// Value subtracted from a decimal identifier to produce its offset instance id.
pub const OFFSET_BASE: u64 = 76_561_197_960_265_728;

/// Bits 32-55 of every individual account identifier.
pub const INDIVIDUAL_MARKER: u64 = 0x0010_0001_0000_0000;

const MARKER_MASK: u64 = 0x00FF_FFFF_0000_0000;
const ACCOUNT_MASK: u64 = 0x7FFF_FFFF;
const LEGACY_PREFIX: &str = "STEAM_";

/// Errors produced when parsing or constructing a [`PlayerId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayerIdError {
    /// The input was empty.
    #[error("player id is empty")]
    Empty,

    /// The decimal form did not parse as an unsigned 64-bit integer.
    #[error("invalid decimal player id: {0}")]
    InvalidDecimal(String),

    /// The legacy `STEAM_X:Y:Z` form was malformed.
    #[error("invalid legacy player id: {0}")]
    InvalidLegacy(String),

    /// The offset `[U:1:N]` form was malformed.
    #[error("invalid offset player id: {0}")]
    InvalidOffset(String),

    /// The legacy parity component was neither 0 nor 1.
    #[error("legacy parity must be 0 or 1, got {0}")]
    InvalidParity(u8),

    /// The legacy account number does not fit in 31 bits.
    #[error("legacy account number {0} exceeds 31 bits")]
    AccountOutOfRange(u32),

    /// The offset instance id does not map to a 64-bit identifier.
    #[error("offset instance id {0} overflows a 64-bit player id")]
    OffsetOverflow(u64),
}

/// Components of the legacy `STEAM_{universe}:{parity}:{account}` encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LegacyParts {
    /// Top byte of the identifier.
    pub universe: u8,
    /// Lowest bit of the identifier (0 or 1).
    pub parity: u8,
    /// Bits 1-31 of the identifier.
    pub account: u32,
}

impl fmt::Display for LegacyParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{LEGACY_PREFIX}{}:{}:{}", self.universe, self.parity, self.account)
    }
}

/// A player's 64-bit identifier. Equality and ordering are by integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayerId(u64);

impl PlayerId {
    /// Wrap a raw 64-bit identifier.
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Return the underlying integer.
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Build an identifier from its legacy components.
    ///
    /// # Errors
    ///
    /// Fails if `parity` is not 0 or 1, or `account` needs more than 31 bits.
    pub fn from_legacy(parts: LegacyParts) -> Result<Self, PlayerIdError> {
        if parts.parity > 1 {
            return Err(PlayerIdError::InvalidParity(parts.parity));
        }
        if u64::from(parts.account) > ACCOUNT_MASK {
            return Err(PlayerIdError::AccountOutOfRange(parts.account));
        }
        Ok(Self(
            (u64::from(parts.universe) << 56)
                | INDIVIDUAL_MARKER
                | (u64::from(parts.account) << 1)
                | u64::from(parts.parity),
        ))
    }

    /// Split into legacy components, or `None` outside the individual-account domain.
    pub fn legacy_parts(self) -> Option<LegacyParts> {
        if self.0 & MARKER_MASK != INDIVIDUAL_MARKER {
            return None;
        }
        Some(LegacyParts {
            universe: u8::try_from(self.0 >> 56).ok()?,
            parity: u8::from(self.0 & 1 == 1),
            account: u32::try_from((self.0 >> 1) & ACCOUNT_MASK).ok()?,
        })
    }

    /// Build an identifier from its offset instance id.
    ///
    /// # Errors
    ///
    /// Fails if the sum overflows 64 bits.
    pub fn from_instance_id(instance: u64) -> Result<Self, PlayerIdError> {
        OFFSET_BASE
            .checked_add(instance)
            .map(Self)
            .ok_or(PlayerIdError::OffsetOverflow(instance))
    }

    /// The offset instance id, or `None` for identifiers below [`OFFSET_BASE`].
    pub const fn instance_id(self) -> Option<u64> {
        self.0.checked_sub(OFFSET_BASE)
    }

    /// Render the legacy `STEAM_X:Y:Z` form.
    pub fn to_legacy_string(self) -> Option<String> {
        self.legacy_parts().map(|parts| parts.to_string())
    }

    /// Render the offset `[U:1:N]` form.
    pub fn to_offset_string(self) -> Option<String> {
        self.instance_id().map(|instance| format!("[U:1:{instance}]"))
    }

    fn parse_decimal(s: &str) -> Result<Self, PlayerIdError> {
        s.parse::<u64>()
            .ok()
            .map(Self)
            .ok_or_else(|| PlayerIdError::InvalidDecimal(s.to_owned()))
    }

    fn parse_legacy(s: &str) -> Result<Self, PlayerIdError> {
        let invalid = || PlayerIdError::InvalidLegacy(s.to_owned());
        let body = s.strip_prefix(LEGACY_PREFIX).ok_or_else(invalid)?;
        let mut fields = body.split(':');
        let (Some(universe), Some(parity), Some(account), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(invalid());
        };
        Self::from_legacy(LegacyParts {
            universe: universe.parse().ok().ok_or_else(invalid)?,
            parity: parity.parse().ok().ok_or_else(invalid)?,
            account: account.parse().ok().ok_or_else(invalid)?,
        })
    }

    fn parse_offset(s: &str) -> Result<Self, PlayerIdError> {
        let invalid = || PlayerIdError::InvalidOffset(s.to_owned());
        let inner = s
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(s);
        let instance = inner
            .strip_prefix("U:1:")
            .ok_or_else(invalid)?
            .parse::<u64>()
            .ok()
            .ok_or_else(invalid)?;
        Self::from_instance_id(instance)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PlayerId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<PlayerId> for u64 {
    fn from(id: PlayerId) -> Self {
        id.0
    }
}

/// Parses any of the three encodings.
impl FromStr for PlayerId {
    type Err = PlayerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            Err(PlayerIdError::Empty)
        } else if s.starts_with(LEGACY_PREFIX) {
            Self::parse_legacy(s)
        } else if s.starts_with('[') || s.starts_with("U:") {
            Self::parse_offset(s)
        } else {
            Self::parse_decimal(s)
        }
    }
}

impl<'de> Deserialize<'de> for PlayerId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(PlayerIdVisitor)
    }
}

struct PlayerIdVisitor;

impl Visitor<'_> for PlayerIdVisitor {
    type Value = PlayerId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a player id as a decimal string or unsigned integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(PlayerId(v))
    }
}
