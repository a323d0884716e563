//! Three-component vectors transmitted as delimited strings.
//!
//! Positions, velocities and view directions arrive as a single string of
//! three comma-separated floats, e.g. `"12.5, -3.0, 900.2"`. Anything other
//! than exactly three numeric components is a hard decode failure.

use core::fmt;
use core::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

/// Errors produced when parsing a [`Vec3`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VectorError {
    /// The string did not split into exactly three components.
    #[error("expected 3 vector components, found {found}")]
    ComponentCount {
        /// Number of components present.
        found: usize,
    },

    /// A component was not a floating point number.
    #[error("invalid vector component: {component:?}")]
    InvalidComponent {
        /// The offending component, trimmed.
        component: String,
    },
}

/// A point or direction in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vec3 {
    /// Construct a vector from components.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Component-wise minimum.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    /// Component-wise maximum.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    /// Point halfway between `self` and `other`.
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        Self::new(
            (self.x + other.x) / 2.0,
            (self.y + other.y) / 2.0,
            (self.z + other.z) / 2.0,
        )
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: Self) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        dz.mul_add(dz, dx.mul_add(dx, dy * dy)).sqrt()
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.x, self.y, self.z)
    }
}

impl FromStr for Vec3 {
    type Err = VectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let &[x, y, z] = parts.as_slice() else {
            return Err(VectorError::ComponentCount { found: parts.len() });
        };
        let component = |raw: &str| {
            raw.parse::<f64>()
                .ok()
                .ok_or_else(|| VectorError::InvalidComponent {
                    component: raw.to_owned(),
                })
        };
        Ok(Self::new(component(x)?, component(y)?, component(z)?))
    }
}

impl<'de> Deserialize<'de> for Vec3 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(Vec3Visitor)
    }
}

struct Vec3Visitor;

impl Visitor<'_> for Vec3Visitor {
    type Value = Vec3;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string of three comma-separated numbers")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }
}
