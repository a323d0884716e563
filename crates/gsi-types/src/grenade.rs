//! Grenades as a tagged union resolved from the `type` discriminator.
//!
//! Every grenade shares a base of {type, owner, lifetime}. The discriminator
//! is read first and looked up in [`SHAPE_DECODERS`] to pick the payload
//! shape; a discriminator the table does not know falls back to
//! [`GrenadeShape::Base`] so new grenade kinds never fail the decode.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::de::{self, Deserializer};
use serde::Deserialize;

use crate::enums::GrenadeType;
use crate::player_id::PlayerId;
use crate::vector::Vec3;
use crate::wire_enum::ResolvedOrRaw;

/// Padding added to the measured span of a fire area, in world units.
///
/// Flame points mark flame origins, not their visible extent.
pub const FIRE_SIZE_PADDING: f64 = 60.0;

/// A grenade in flight or deployed.
#[derive(Debug, Clone, PartialEq)]
pub struct Grenade {
    /// The wire discriminator.
    pub kind: ResolvedOrRaw<GrenadeType>,
    /// Player who threw the grenade.
    pub owner: Option<PlayerId>,
    /// Seconds since the grenade was thrown.
    pub lifetime: Option<f64>,
    /// Type-specific payload.
    pub shape: GrenadeShape,
}

/// Payload shape selected by the grenade discriminator.
#[derive(Debug, Clone, PartialEq)]
pub enum GrenadeShape {
    /// Unknown discriminator; only the base fields are available.
    Base,
    /// A grenade in flight.
    Projectile(Projectile),
    /// A grenade whose effect is active for a while (smoke, decoy).
    Effect(ActiveEffect),
    /// Fire burning on the ground.
    Fire(FireArea),
}

/// Position and velocity of a thrown grenade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projectile {
    /// Current position.
    pub position: Vec3,
    /// Current velocity.
    pub velocity: Vec3,
}

/// A grenade with an effect timer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveEffect {
    /// Current position.
    pub position: Vec3,
    /// Current velocity.
    pub velocity: Vec3,
    /// Seconds the effect has been active; zero while still in flight.
    pub effect_time: f64,
}

/// Approximate extent of a fire area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireBounds {
    /// Center of the flames' bounding box.
    pub center: Vec3,
    /// Largest span along any axis, plus [`FIRE_SIZE_PADDING`].
    pub size: f64,
}

/// A set of flame points with lazily computed bounds.
///
/// The bounds are derived from the points on first access and cached; they
/// are never transmitted by the game.
#[derive(Debug, Clone)]
pub struct FireArea {
    flames: BTreeMap<String, Vec3>,
    bounds: OnceLock<Option<FireBounds>>,
}

impl FireArea {
    /// Wrap a map of flame id to flame position.
    pub const fn new(flames: BTreeMap<String, Vec3>) -> Self {
        Self {
            flames,
            bounds: OnceLock::new(),
        }
    }

    /// Flame positions keyed by flame id.
    pub const fn flames(&self) -> &BTreeMap<String, Vec3> {
        &self.flames
    }

    /// Approximate bounds, or `None` when no flames are burning.
    pub fn bounds(&self) -> Option<FireBounds> {
        *self.bounds.get_or_init(|| compute_bounds(&self.flames))
    }

    /// Center of the fire area.
    pub fn center(&self) -> Option<Vec3> {
        self.bounds().map(|bounds| bounds.center)
    }

    /// Approximate diameter of the fire area.
    pub fn size(&self) -> Option<f64> {
        self.bounds().map(|bounds| bounds.size)
    }
}

impl PartialEq for FireArea {
    fn eq(&self, other: &Self) -> bool {
        self.flames == other.flames
    }
}

fn compute_bounds(flames: &BTreeMap<String, Vec3>) -> Option<FireBounds> {
    let mut points = flames.values().copied();
    let first = points.next()?;
    let (min, max) = points.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
    let span = (max.x - min.x).max(max.y - min.y).max(max.z - min.z);
    Some(FireBounds {
        center: min.midpoint(max),
        size: span + FIRE_SIZE_PADDING,
    })
}

/// Every field any grenade shape may carry.
#[derive(Debug, Deserialize)]
struct WireGrenade {
    #[serde(rename = "type")]
    kind: ResolvedOrRaw<GrenadeType>,
    owner: Option<PlayerId>,
    #[serde(default, deserialize_with = "crate::de::lenient_f64_opt")]
    lifetime: Option<f64>,
    position: Option<Vec3>,
    velocity: Option<Vec3>,
    #[serde(default, deserialize_with = "crate::de::lenient_f64_opt")]
    effecttime: Option<f64>,
    flames: Option<BTreeMap<String, Vec3>>,
}

/// Builds a payload shape, or names the missing field.
type ShapeDecoder = fn(&mut WireGrenade) -> Result<GrenadeShape, &'static str>;

/// Discriminator to payload constructor.
const SHAPE_DECODERS: &[(GrenadeType, ShapeDecoder)] = &[
    (GrenadeType::Frag, decode_projectile),
    (GrenadeType::Flashbang, decode_projectile),
    (GrenadeType::Firebomb, decode_projectile),
    (GrenadeType::Smoke, decode_effect),
    (GrenadeType::Decoy, decode_effect),
    (GrenadeType::Inferno, decode_fire),
];

fn decode_projectile(wire: &mut WireGrenade) -> Result<GrenadeShape, &'static str> {
    Ok(GrenadeShape::Projectile(Projectile {
        position: wire.position.ok_or("position")?,
        velocity: wire.velocity.ok_or("velocity")?,
    }))
}

fn decode_effect(wire: &mut WireGrenade) -> Result<GrenadeShape, &'static str> {
    Ok(GrenadeShape::Effect(ActiveEffect {
        position: wire.position.ok_or("position")?,
        velocity: wire.velocity.ok_or("velocity")?,
        effect_time: wire.effecttime.unwrap_or(0.0),
    }))
}

fn decode_fire(wire: &mut WireGrenade) -> Result<GrenadeShape, &'static str> {
    let flames = wire.flames.take().unwrap_or_default();
    Ok(GrenadeShape::Fire(FireArea::new(flames)))
}

impl Grenade {
    /// The shape constructor registered for a discriminator, if any.
    fn decoder_for(kind: &ResolvedOrRaw<GrenadeType>) -> Option<ShapeDecoder> {
        let matched = kind.matched()?;
        SHAPE_DECODERS
            .iter()
            .find(|(grenade_type, _)| *grenade_type == matched)
            .map(|(_, decoder)| *decoder)
    }

    /// Projectile payload, when this grenade is in flight.
    pub const fn projectile(&self) -> Option<&Projectile> {
        match &self.shape {
            GrenadeShape::Projectile(projectile) => Some(projectile),
            _ => None,
        }
    }

    /// Fire payload, when this grenade is a burning area.
    pub const fn fire(&self) -> Option<&FireArea> {
        match &self.shape {
            GrenadeShape::Fire(area) => Some(area),
            _ => None,
        }
    }

    /// Current position, for shapes that carry one.
    pub fn position(&self) -> Option<Vec3> {
        match &self.shape {
            GrenadeShape::Projectile(projectile) => Some(projectile.position),
            GrenadeShape::Effect(effect) => Some(effect.position),
            GrenadeShape::Fire(area) => area.center(),
            GrenadeShape::Base => None,
        }
    }
}

impl<'de> Deserialize<'de> for Grenade {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut wire = WireGrenade::deserialize(deserializer)?;
        let shape = match Self::decoder_for(&wire.kind) {
            Some(decode) => decode(&mut wire).map_err(<D::Error as de::Error>::missing_field)?,
            None => GrenadeShape::Base,
        };
        Ok(Self {
            kind: wire.kind,
            owner: wire.owner,
            lifetime: wire.lifetime,
            shape,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use serde_json::json;

    use super::*;

    fn decode(value: &serde_json::Value) -> Grenade {
        Grenade::deserialize(value).unwrap()
    }

    #[test]
    fn frag_is_a_projectile() {
        let grenade = decode(&json!({
            "owner": "76561197960265729",
            "position": "1.0, 2.0, 3.0",
            "velocity": "0.0, 0.0, -9.8",
            "lifetime": "0.4",
            "type": "frag"
        }));
        assert!(grenade.kind.is(GrenadeType::Frag));
        assert_eq!(grenade.owner.map(PlayerId::as_u64), Some(76_561_197_960_265_729));
        assert_eq!(grenade.lifetime, Some(0.4));
        let projectile = grenade.projectile().unwrap();
        assert_eq!(projectile.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(projectile.velocity.z, -9.8);
    }

    #[test]
    fn smoke_carries_effect_time() {
        let grenade = decode(&json!({
            "position": "0, 0, 0",
            "velocity": "0, 0, 0",
            "lifetime": "8.2",
            "effecttime": "5.5",
            "type": "smoke"
        }));
        let GrenadeShape::Effect(effect) = grenade.shape else {
            unreachable!("smoke decodes to an effect shape");
        };
        assert_eq!(effect.effect_time, 5.5);
    }

    #[test]
    fn unknown_type_falls_back_to_base() {
        let grenade = decode(&json!({
            "owner": "76561197960265729",
            "lifetime": "1.0",
            "type": "snowball",
            "position": "1, 2, 3"
        }));
        assert_eq!(grenade.shape, GrenadeShape::Base);
        assert_eq!(grenade.kind.raw(), "snowball");
        assert_eq!(grenade.position(), None);
    }

    #[test]
    fn known_type_missing_payload_fails() {
        let result = Grenade::deserialize(&json!({ "type": "flashbang", "position": "1,2,3" }));
        assert!(result.is_err());
    }

    #[test]
    fn inferno_bounds_are_computed_lazily() {
        let grenade = decode(&json!({
            "owner": "76561197960265729",
            "lifetime": "3.1",
            "type": "inferno",
            "flames": {
                "f1": "0, 0, 0",
                "f2": "100, 40, 0",
                "f3": "50, 80, 10"
            }
        }));
        let area = grenade.fire().unwrap();
        assert_eq!(area.flames().len(), 3);
        let bounds = area.bounds().unwrap();
        assert_eq!(bounds.center, Vec3::new(50.0, 40.0, 5.0));
        assert_eq!(bounds.size, 100.0 + FIRE_SIZE_PADDING);
        assert_eq!(area.bounds(), Some(bounds));
        assert_eq!(grenade.position(), Some(Vec3::new(50.0, 40.0, 5.0)));
    }

    #[test]
    fn inferno_without_flames_has_no_bounds() {
        let grenade = decode(&json!({ "type": "inferno", "lifetime": "0.1" }));
        let area = grenade.fire().unwrap();
        assert!(area.flames().is_empty());
        assert_eq!(area.bounds(), None);
    }

    #[test]
    fn size_is_largest_span_on_any_axis() {
        let mut flames = BTreeMap::new();
        flames.insert(String::from("a"), Vec3::new(0.0, 0.0, 0.0));
        flames.insert(String::from("b"), Vec3::new(10.0, 30.0, 200.0));
        let area = FireArea::new(flames);
        assert_eq!(area.size(), Some(200.0 + FIRE_SIZE_PADDING));

        let mut flames = BTreeMap::new();
        flames.insert(String::from("a"), Vec3::new(-50.0, 0.0, 5.0));
        flames.insert(String::from("b"), Vec3::new(50.0, 40.0, 15.0));
        let area = FireArea::new(flames);
        assert_eq!(area.size(), Some(100.0 + FIRE_SIZE_PADDING));
        assert_eq!(area.center(), Some(Vec3::new(0.0, 20.0, 10.0)));
    }
}
