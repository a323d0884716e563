//! Typed game state model for Game State Integration (GSI) telemetry.
//!
//! The game pushes loosely structured JSON whose vocabulary grows between
//! releases. This crate decodes those documents into an immutable, strongly
//! typed [`GameState`] without losing information the current build does not
//! understand yet.
//!
//! # Modules
//!
//! - [`wire_enum`] -- [`ResolvedOrRaw`], the enum-with-raw-fallback wrapper
//! - [`enums`] -- Known enumerated vocabularies (map modes, phases, teams, ...)
//! - [`player_id`] -- [`PlayerId`] and its three textual encodings
//! - [`vector`] -- [`Vec3`] decoded from `"x, y, z"` strings
//! - [`grenade`] -- Grenade tagged union and fire-area bounds
//! - [`state`] -- The [`GameState`] snapshot and its sections
//! - [`de`] -- Serde helpers for index-keyed maps and lenient numbers
//! - [`error`] -- [`DecodeError`]

pub mod de;
pub mod enums;
pub mod error;
pub mod grenade;
pub mod player_id;
pub mod state;
pub mod vector;
pub mod wire_enum;

// Re-export all public types at crate root for convenience.
pub use enums::{
    BombStatus, CountdownPhase, GrenadeType, MapMode, MapPhase, PlayerActivity, RoundBomb,
    RoundOutcome, RoundPhase, Team, WeaponState, WeaponType,
};
pub use error::DecodeError;
pub use grenade::{
    ActiveEffect, FIRE_SIZE_PADDING, FireArea, FireBounds, Grenade, GrenadeShape, Projectile,
};
pub use player_id::{LegacyParts, PlayerId, PlayerIdError};
pub use state::{
    Bomb, GameState, MapState, MatchStats, PhaseCountdown, Player, PlayerVitals, Provider,
    RoundState, TeamState, Weapon,
};
pub use vector::{Vec3, VectorError};
pub use wire_enum::{ResolvedOrRaw, WireEnum};
