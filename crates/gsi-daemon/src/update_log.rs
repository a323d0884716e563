//! Built-in listener that logs every committed update.

use gsi_core::{GameStateUpdate, StateListener};
use tracing::{debug, info};

/// Logs a one-line summary of each update.
///
/// Heartbeats are logged at `debug` so an idle game does not flood the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct UpdateLogger;

impl StateListener for UpdateLogger {
    fn name(&self) -> &str {
        "update-log"
    }

    fn on_update(&self, update: &GameStateUpdate) -> anyhow::Result<()> {
        let summary = Summary::of(update);
        if update.context.is_heartbeat() {
            debug!(
                sequence = update.sequence(),
                client = %update.context.client(),
                "heartbeat"
            );
        } else {
            info!(
                sequence = update.sequence(),
                client = %update.context.client(),
                map = %summary.map,
                phase = %summary.phase,
                round = %summary.round,
                player = %summary.player,
                "game state update"
            );
        }
        Ok(())
    }
}

/// Display fields pulled out of an update. Missing sections read as `-`.
#[derive(Debug, PartialEq, Eq)]
struct Summary {
    map: String,
    phase: String,
    round: String,
    player: String,
}

impl Summary {
    fn of(update: &GameStateUpdate) -> Self {
        let state = &update.state;
        let map = state.map.as_ref();
        Self {
            map: or_dash(map.and_then(|m| m.name.clone())),
            phase: or_dash(map.and_then(|m| m.phase.as_ref()).map(ToString::to_string)),
            round: or_dash(
                state
                    .round
                    .as_ref()
                    .and_then(|r| r.phase.as_ref())
                    .map(ToString::to_string),
            ),
            player: or_dash(state.player.as_ref().and_then(|p| p.name.clone())),
        }
    }
}

fn or_dash(value: Option<String>) -> String {
    value.unwrap_or_else(|| String::from("-"))
}
