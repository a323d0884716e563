//! The decoded game state snapshot.
//!
//! [`GameState`] is an immutable tree of independently optional sections.
//! A section the game did not send decodes to `None`, never to a default
//! instance, so consumers can tell "not reported" from "reported as zero".
//! Within a section, counters default to zero when omitted.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::de::{lenient_f64_opt, ordered_by_index};
use crate::enums::{
    BombStatus, CountdownPhase, MapMode, MapPhase, PlayerActivity, RoundBomb, RoundOutcome,
    RoundPhase, Team, WeaponState, WeaponType,
};
use crate::error::DecodeError;
use crate::grenade::Grenade;
use crate::player_id::PlayerId;
use crate::vector::Vec3;
use crate::wire_enum::ResolvedOrRaw;

/// One decoded GSI update.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "WireGameState")]
pub struct GameState {
    /// The game client that produced the update.
    pub provider: Option<Provider>,
    /// The current map and match.
    pub map: Option<MapState>,
    /// The current round.
    pub round: Option<RoundState>,
    /// The local (or spectated) player.
    pub player: Option<Player>,
    /// Every player, keyed by id. Only sent to spectators and observers.
    pub all_players: Option<BTreeMap<PlayerId, Player>>,
    /// Active grenades keyed by an opaque entity id.
    ///
    /// Sent as `grenades` or `allgrenades`. When a document carries both,
    /// the maps are merged and `grenades` wins for an id present in both.
    pub grenades: Option<BTreeMap<String, Grenade>>,
    /// The bomb.
    pub bomb: Option<Bomb>,
    /// The countdown of the current phase.
    pub phase_countdown: Option<PhaseCountdown>,
}

/// [`GameState`] as laid out on the wire.
#[derive(Deserialize)]
struct WireGameState {
    provider: Option<Provider>,
    map: Option<MapState>,
    round: Option<RoundState>,
    player: Option<Player>,
    allplayers: Option<BTreeMap<PlayerId, Player>>,
    grenades: Option<BTreeMap<String, Grenade>>,
    allgrenades: Option<BTreeMap<String, Grenade>>,
    bomb: Option<Bomb>,
    phase_countdowns: Option<PhaseCountdown>,
}

impl From<WireGameState> for GameState {
    fn from(wire: WireGameState) -> Self {
        let grenades = match (wire.allgrenades, wire.grenades) {
            (Some(mut all), Some(grenades)) => {
                all.extend(grenades);
                Some(all)
            }
            (all, grenades) => grenades.or(all),
        };
        Self {
            provider: wire.provider,
            map: wire.map,
            round: wire.round,
            player: wire.player,
            all_players: wire.allplayers,
            grenades,
            bomb: wire.bomb,
            phase_countdown: wire.phase_countdowns,
        }
    }
}

impl GameState {
    /// Decode a parsed JSON document.
    ///
    /// Keys outside the known sections (`auth`, `added`, `previously`, ...)
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::NotAnObject`] for non-object documents and
    /// [`DecodeError::Invalid`] when a section is malformed, e.g. a vector
    /// with the wrong number of components.
    pub fn from_document(document: &Value) -> Result<Self, DecodeError> {
        if !document.is_object() {
            return Err(DecodeError::NotAnObject);
        }
        Ok(Self::deserialize(document)?)
    }

    /// Parse and decode raw JSON bytes.
    ///
    /// # Errors
    ///
    /// Same as [`from_document`](Self::from_document), plus JSON syntax errors.
    pub fn from_slice(body: &[u8]) -> Result<Self, DecodeError> {
        let document: Value = serde_json::from_slice(body)?;
        Self::from_document(&document)
    }

    /// Look up a player in `allplayers`, falling back to the local player.
    pub fn player_by_id(&self, id: PlayerId) -> Option<&Player> {
        self.all_players
            .as_ref()
            .and_then(|players| players.get(&id))
            .or_else(|| {
                self.player
                    .as_ref()
                    .filter(|player| player.steam_id == Some(id))
            })
    }

    /// Number of players reported in `allplayers`.
    pub fn player_count(&self) -> usize {
        self.all_players.as_ref().map_or(0, BTreeMap::len)
    }

    /// Whether no section was reported at all.
    pub const fn is_empty(&self) -> bool {
        self.provider.is_none()
            && self.map.is_none()
            && self.round.is_none()
            && self.player.is_none()
            && self.all_players.is_none()
            && self.grenades.is_none()
            && self.bomb.is_none()
            && self.phase_countdown.is_none()
    }
}

/// The `provider` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Provider {
    /// Game name.
    pub name: Option<String>,
    /// Steam application id.
    pub appid: Option<u32>,
    /// Game build number.
    pub version: Option<u32>,
    /// Player id of the client sending updates.
    #[serde(rename = "steamid")]
    pub steam_id: Option<PlayerId>,
    /// Unix timestamp at which the client produced the update.
    pub timestamp: Option<i64>,
}

/// The `map` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MapState {
    /// Game mode.
    pub mode: Option<ResolvedOrRaw<MapMode>>,
    /// Map name, e.g. `de_dust2`.
    pub name: Option<String>,
    /// Match phase.
    pub phase: Option<ResolvedOrRaw<MapPhase>>,
    /// Number of completed rounds.
    pub round: Option<u32>,
    /// Counter-terrorist side.
    pub team_ct: Option<TeamState>,
    /// Terrorist side.
    pub team_t: Option<TeamState>,
    /// Maps required to win the series.
    pub num_matches_to_win_series: Option<u32>,
    /// Spectators currently watching.
    pub current_spectators: Option<u32>,
    /// Souvenir packages dropped so far.
    pub souvenirs_total: Option<u32>,
    /// Outcome of each completed round, in round order.
    #[serde(default, deserialize_with = "ordered_by_index")]
    pub round_wins: Vec<ResolvedOrRaw<RoundOutcome>>,
}

/// One side's standing in the match.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct TeamState {
    /// Rounds won.
    pub score: u32,
    /// Team name, when set by the server.
    pub name: Option<String>,
    /// Country flag code, when set by the server.
    pub flag: Option<String>,
    /// Consecutive rounds lost (drives the loss bonus).
    pub consecutive_round_losses: u32,
    /// Tactical timeouts left.
    pub timeouts_remaining: u32,
    /// Maps won in the series.
    pub matches_won_this_series: u32,
}

/// The `round` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoundState {
    /// Round phase.
    pub phase: Option<ResolvedOrRaw<RoundPhase>>,
    /// Bomb summary; only sent once the bomb is planted.
    pub bomb: Option<ResolvedOrRaw<RoundBomb>>,
    /// Winning side; only sent once the round is over.
    pub win_team: Option<ResolvedOrRaw<Team>>,
}

/// A player, from `player` or an `allplayers` entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Player {
    /// Player id. `allplayers` entries carry it as the map key instead.
    #[serde(rename = "steamid")]
    pub steam_id: Option<PlayerId>,
    /// Clan tag.
    pub clan: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Observer slot number.
    pub observer_slot: Option<u32>,
    /// Side the player is on.
    pub team: Option<ResolvedOrRaw<Team>>,
    /// What the player is doing.
    pub activity: Option<ResolvedOrRaw<PlayerActivity>>,
    /// Health, armor, money and effects.
    pub state: Option<PlayerVitals>,
    /// Carried weapons, in slot order.
    #[serde(default, deserialize_with = "ordered_by_index")]
    pub weapons: Vec<Weapon>,
    /// Match statistics.
    pub match_stats: Option<MatchStats>,
    /// World position.
    pub position: Option<Vec3>,
    /// View direction.
    pub forward: Option<Vec3>,
    /// Spectated target as sent by the game (a player id, or `free`).
    pub spectarget: Option<String>,
}

impl Player {
    /// The currently held weapon.
    pub fn active_weapon(&self) -> Option<&Weapon> {
        self.weapons.iter().find(|weapon| {
            weapon
                .state
                .as_ref()
                .is_some_and(|state| state.is(WeaponState::Active))
        })
    }

    /// The spectated player, when the target is a player id.
    pub fn spectating(&self) -> Option<PlayerId> {
        self.spectarget.as_deref().and_then(|raw| raw.parse().ok())
    }

    /// Whether the player has health left. Unknown when no state was sent.
    pub fn is_alive(&self) -> Option<bool> {
        self.state.as_ref().map(|state| state.health > 0)
    }
}

/// The `state` block of a player.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct PlayerVitals {
    /// Health, 0-100.
    pub health: u32,
    /// Armor, 0-100.
    pub armor: u32,
    /// Whether the player has a helmet.
    pub helmet: bool,
    /// Whether the player has a defuse kit. Only sent for counter-terrorists.
    pub defusekit: Option<bool>,
    /// Flash intensity, 0-255.
    pub flashed: u32,
    /// Smoke intensity, 0-255.
    pub smoked: u32,
    /// Burn intensity, 0-255.
    pub burning: u32,
    /// Money.
    pub money: u32,
    /// Kills this round.
    pub round_kills: u32,
    /// Headshot kills this round.
    pub round_killhs: u32,
    /// Damage dealt this round.
    pub round_totaldmg: u32,
    /// Value of carried equipment.
    pub equip_value: u32,
}

/// One carried weapon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Weapon {
    /// Internal weapon name, e.g. `weapon_ak47`.
    pub name: Option<String>,
    /// Skin name, or `default`.
    pub paintkit: Option<String>,
    /// Weapon category.
    #[serde(rename = "type")]
    pub kind: Option<ResolvedOrRaw<WeaponType>>,
    /// Rounds in the magazine.
    pub ammo_clip: Option<u32>,
    /// Magazine capacity.
    pub ammo_clip_max: Option<u32>,
    /// Reserve ammunition.
    pub ammo_reserve: Option<u32>,
    /// Whether the weapon is held, holstered or reloading.
    pub state: Option<ResolvedOrRaw<WeaponState>>,
}

/// The `match_stats` block of a player.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct MatchStats {
    /// Kills.
    pub kills: i32,
    /// Assists.
    pub assists: i32,
    /// Deaths.
    pub deaths: i32,
    /// MVP awards.
    pub mvps: i32,
    /// Scoreboard score.
    pub score: i32,
}

/// The `bomb` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Bomb {
    /// Bomb state.
    pub state: Option<ResolvedOrRaw<BombStatus>>,
    /// World position.
    pub position: Option<Vec3>,
    /// Carrier, planter or defuser.
    pub player: Option<PlayerId>,
    /// Seconds left on the current bomb timer.
    #[serde(default, deserialize_with = "lenient_f64_opt")]
    pub countdown: Option<f64>,
}

/// The `phase_countdowns` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PhaseCountdown {
    /// Phase being counted down.
    pub phase: Option<ResolvedOrRaw<CountdownPhase>>,
    /// Seconds until the phase ends.
    #[serde(default, deserialize_with = "lenient_f64_opt")]
    pub phase_ends_in: Option<f64>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_sections_are_absent() {
        let state = GameState::from_document(&json!({ "map": { "name": "de_nuke" } })).unwrap();
        assert!(state.map.is_some());
        assert!(state.round.is_none());
        assert!(state.player.is_none());
        assert!(state.all_players.is_none());
        assert!(state.bomb.is_none());
        assert!(!state.is_empty());
    }

    #[test]
    fn empty_document_decodes_to_empty_state() {
        let state = GameState::from_document(&json!({})).unwrap();
        assert!(state.is_empty());
        assert_eq!(state, GameState::default());
    }

    #[test]
    fn non_object_document_fails() {
        assert!(matches!(
            GameState::from_document(&json!([1, 2])),
            Err(DecodeError::NotAnObject)
        ));
    }

    #[test]
    fn map_section_decodes() {
        let state = GameState::from_document(&json!({
            "map": { "name": "de_dust2", "phase": "live", "round": 3, "mode": "competitive" }
        }))
        .unwrap();
        let map = state.map.unwrap();
        assert_eq!(map.name.as_deref(), Some("de_dust2"));
        assert_eq!(map.phase.unwrap().matched(), Some(MapPhase::Live));
        assert_eq!(map.round, Some(3));
        assert!(map.mode.unwrap().is(MapMode::Competitive));
        assert!(map.round_wins.is_empty());
    }

    #[test]
    fn unknown_phase_is_kept_raw() {
        let state = GameState::from_document(&json!({
            "map": { "name": "de_dust2", "phase": "de_dust3_beta", "round": 4 }
        }))
        .unwrap();
        let phase = state.map.unwrap().phase.unwrap();
        assert_eq!(phase.matched(), None);
        assert_eq!(phase.raw(), "de_dust3_beta");
    }

    #[test]
    fn bad_vector_fails_whole_decode() {
        let result = GameState::from_document(&json!({
            "player": { "name": "n0thing", "position": "12.5, -3.0" }
        }));
        assert!(matches!(result, Err(DecodeError::Invalid { .. })));
    }

    #[test]
    fn active_weapon_and_spectating() {
        let state = GameState::from_document(&json!({
            "player": {
                "steamid": "76561197960265729",
                "spectarget": "76561197960265730",
                "weapons": {
                    "weapon_1": { "name": "weapon_glock", "type": "Pistol", "state": "holstered" },
                    "weapon_0": { "name": "weapon_knife", "type": "Knife", "state": "active" }
                }
            }
        }))
        .unwrap();
        let player = state.player.as_ref().unwrap();
        assert_eq!(player.weapons.len(), 2);
        assert_eq!(player.weapons[0].name.as_deref(), Some("weapon_knife"));
        assert_eq!(
            player.active_weapon().and_then(|w| w.name.as_deref()),
            Some("weapon_knife")
        );
        assert_eq!(player.spectating(), Some(PlayerId::from_u64(76_561_197_960_265_730)));
        assert!(state.player_by_id(PlayerId::from_u64(76_561_197_960_265_729)).is_some());
    }

    #[test]
    fn free_spectator_target_is_not_a_player() {
        let state =
            GameState::from_document(&json!({ "player": { "spectarget": "free" } })).unwrap();
        assert_eq!(state.player.unwrap().spectating(), None);
    }

    #[test]
    fn phase_countdown_accepts_string_seconds() {
        let state = GameState::from_document(&json!({
            "phase_countdowns": { "phase": "freezetime", "phase_ends_in": "14.9" }
        }))
        .unwrap();
        let countdown = state.phase_countdown.unwrap();
        assert!(countdown.phase.unwrap().is(CountdownPhase::FreezeTime));
        assert_eq!(countdown.phase_ends_in, Some(14.9));
    }

    #[test]
    fn from_slice_reports_syntax_errors() {
        assert!(matches!(
            GameState::from_slice(b"{not json"),
            Err(DecodeError::Invalid { .. })
        ));
    }
}
