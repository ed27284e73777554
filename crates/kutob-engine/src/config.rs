//! Engine configuration: phase countdowns, player limits, randomness.

use std::time::Duration;

use kutob_protocol::Phase;
use kutob_tick::CountdownConfig;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PhaseTimings
// ---------------------------------------------------------------------------

/// Countdown length, in ticks, for each timed phase.
///
/// A countdown runs while the room sits in a phase; when it elapses the
/// next phase is entered. Night actions and round end have no countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseTimings {
    /// After `start_game`, before the first night.
    pub lobby_start: u32,
    pub night_begin: u32,
    pub day_begin: u32,
    /// Casualties are on screen this long.
    pub day_announce: u32,
    pub discussion: u32,
    pub voting: u32,
    /// The vote verdict is on screen this long.
    pub vote_result: u32,
}

impl Default for PhaseTimings {
    fn default() -> Self {
        Self {
            lobby_start: 10,
            night_begin: 5,
            day_begin: 5,
            day_announce: 5,
            discussion: 60,
            voting: 45,
            vote_result: 10,
        }
    }
}

impl PhaseTimings {
    /// Same length for every timed phase. Handy for demos and tests.
    pub fn uniform(ticks: u32) -> Self {
        Self {
            lobby_start: ticks,
            night_begin: ticks,
            day_begin: ticks,
            day_announce: ticks,
            discussion: ticks,
            voting: ticks,
            vote_result: ticks,
        }
    }

    /// The countdown that runs while the room is in `phase`, or `None` if
    /// that phase advances by other means.
    pub fn countdown_for(&self, phase: Phase) -> Option<u32> {
        match phase {
            Phase::Lobby => Some(self.lobby_start),
            Phase::NightBegins => Some(self.night_begin),
            Phase::NightActions => None,
            Phase::DayBegins => Some(self.day_begin),
            Phase::DayAnnouncement => Some(self.day_announce),
            Phase::Discussion => Some(self.discussion),
            Phase::Voting => Some(self.voting),
            Phase::VoteResult => Some(self.vote_result),
            Phase::RoundEnd => None,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every room controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub timings: PhaseTimings,

    /// Wall-clock length of one countdown tick, in milliseconds.
    pub tick_interval_ms: u64,

    /// Fewest members a room needs before `start_game` is accepted.
    pub min_players: usize,

    pub max_players: usize,

    /// The protector's lethal action unlocks on days where
    /// `cycle % lethal_cycle_interval == 0`.
    pub lethal_cycle_interval: u32,

    /// Seed for role assignment. `None` draws from the OS.
    pub rng_seed: Option<u64>,

    /// Bound of each room actor's command channel.
    pub command_channel_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timings: PhaseTimings::default(),
            tick_interval_ms: 1000,
            min_players: Self::MIN_PLAYERS,
            max_players: Self::MAX_PLAYERS,
            lethal_cycle_interval: 5,
            rng_seed: None,
            command_channel_size: 64,
        }
    }
}

impl EngineConfig {
    /// Smallest table the role table supports.
    pub const MIN_PLAYERS: usize = 5;
    /// Largest table the role table supports.
    pub const MAX_PLAYERS: usize = 10;

    /// Clamps out-of-range values instead of rejecting the config.
    pub fn validated(mut self) -> Self {
        let min = self.min_players.clamp(Self::MIN_PLAYERS, Self::MAX_PLAYERS);
        if min != self.min_players {
            tracing::warn!(requested = self.min_players, using = min, "min_players out of range");
            self.min_players = min;
        }
        let max = self.max_players.clamp(self.min_players, Self::MAX_PLAYERS);
        if max != self.max_players {
            tracing::warn!(requested = self.max_players, using = max, "max_players out of range");
            self.max_players = max;
        }
        if self.lethal_cycle_interval == 0 {
            tracing::warn!("lethal_cycle_interval is 0, using 1");
            self.lethal_cycle_interval = 1;
        }
        if self.tick_interval_ms == 0 {
            tracing::warn!("tick_interval_ms is 0, using 1");
            self.tick_interval_ms = 1;
        }
        if self.command_channel_size == 0 {
            tracing::warn!("command_channel_size is 0, using 1");
            self.command_channel_size = 1;
        }
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn countdown_config(&self) -> CountdownConfig {
        CountdownConfig::with_interval(self.tick_interval())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_timings_default_matches_table() {
        let t = PhaseTimings::default();
        assert_eq!(t.countdown_for(Phase::Lobby), Some(10));
        assert_eq!(t.countdown_for(Phase::NightBegins), Some(5));
        assert_eq!(t.countdown_for(Phase::NightActions), None);
        assert_eq!(t.countdown_for(Phase::DayBegins), Some(5));
        assert_eq!(t.countdown_for(Phase::DayAnnouncement), Some(5));
        assert_eq!(t.countdown_for(Phase::Discussion), Some(60));
        assert_eq!(t.countdown_for(Phase::Voting), Some(45));
        assert_eq!(t.countdown_for(Phase::VoteResult), Some(10));
        assert_eq!(t.countdown_for(Phase::RoundEnd), None);
    }

    #[test]
    fn test_validated_clamps_player_limits() {
        let config = EngineConfig {
            min_players: 2,
            max_players: 40,
            ..EngineConfig::default()
        }
        .validated();
        assert_eq!(config.min_players, 5);
        assert_eq!(config.max_players, 10);
    }

    #[test]
    fn test_validated_replaces_zero_values() {
        let config = EngineConfig {
            lethal_cycle_interval: 0,
            tick_interval_ms: 0,
            command_channel_size: 0,
            ..EngineConfig::default()
        }
        .validated();
        assert_eq!(config.lethal_cycle_interval, 1);
        assert_eq!(config.tick_interval(), Duration::from_millis(1));
        assert_eq!(config.command_channel_size, 1);
    }

    #[test]
    fn test_engine_config_deserializes_partial_json() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"timings":{"discussion":90},"rng_seed":7}"#).unwrap();
        assert_eq!(config.timings.discussion, 90);
        assert_eq!(config.timings.voting, 45);
        assert_eq!(config.rng_seed, Some(7));
        assert_eq!(config.min_players, 5);
    }
}
