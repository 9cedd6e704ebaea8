//! Room state machine and the ready-count barrier.
//!
//! `RoomState` is the in-process view of one room. The shared store stays the source
//! of truth across processes; coordinators rebuild this view with [`RoomState::sync`]
//! before every barrier evaluation and mutate it only through the methods below, which
//! keep `ready_count` equal to the number of ready flags.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    str::FromStr,
};

use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use super::{
    error::BarrierError,
    value_object::{RoomId, UserId, Username},
};

/// Position of a room in the round lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    #[default]
    Waiting,
    Playing,
    Voting,
    Scoring,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Waiting => "waiting",
            Phase::Playing => "playing",
            Phase::Voting => "voting",
            Phase::Scoring => "scoring",
        }
    }

    /// The phase entered once every player has signalled in this one.
    pub fn next(self) -> Phase {
        match self {
            Phase::Waiting | Phase::Scoring => Phase::Playing,
            Phase::Playing => Phase::Voting,
            Phase::Voting => Phase::Scoring,
        }
    }

    /// Whether `signal` counts towards this phase's barrier.
    pub fn accepts(self, signal: ReadySignal) -> bool {
        matches!(
            (self, signal),
            (Phase::Waiting | Phase::Scoring, ReadySignal::Ready)
                | (Phase::Playing, ReadySignal::Submission)
                | (Phase::Voting, ReadySignal::Vote)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(Phase::Waiting),
            "playing" => Ok(Phase::Playing),
            "voting" => Ok(Phase::Voting),
            "scoring" => Ok(Phase::Scoring),
            other => Err(format!("unknown phase '{}'", other)),
        }
    }
}

/// The kind of acknowledgment a player sends for the current barrier round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadySignal {
    /// "Ready for the next round" (lobby and leaderboard).
    Ready,
    /// A picked picture (prompt phase).
    Submission,
    /// A cast vote (voting phase).
    Vote,
}

/// Result of removing a player from the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    /// The player had signalled in the current round.
    pub was_ready: bool,
}

/// One line of the leaderboard fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreLine {
    pub username: String,
    pub round_score: i64,
    pub total: i64,
}

/// Read model of a room, served by the HTTP API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomDetail {
    pub id: RoomId,
    pub phase: Phase,
    /// `(user, username, cumulative score)` sorted by username.
    pub players: Vec<(UserId, String, i64)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomState {
    pub id: RoomId,
    players: HashMap<UserId, Username>,
    player_statuses: HashMap<UserId, bool>,
    ready_count: usize,
    phase: Phase,
}

impl RoomState {
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            players: HashMap::new(),
            player_statuses: HashMap::new(),
            ready_count: 0,
            phase: Phase::Waiting,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn ready_count(&self) -> usize {
        self.ready_count
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, user: &UserId) -> bool {
        self.players.contains_key(user)
    }

    pub fn is_ready(&self, user: &UserId) -> bool {
        self.player_statuses.get(user).copied().unwrap_or(false)
    }

    /// Players of the roster, sorted by id.
    pub fn player_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.players.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn username(&self, user: &UserId) -> Option<&Username> {
        self.players.get(user)
    }

    /// Usernames of the roster, sorted for stable rendering.
    pub fn usernames(&self) -> Vec<Username> {
        let mut names: Vec<Username> = self.players.values().cloned().collect();
        names.sort();
        names
    }

    /// Adds a player as not ready. Returns `false` (and only renames) when present.
    pub fn add_player(&mut self, user: UserId, username: Username) -> bool {
        if let Some(existing) = self.players.get_mut(&user) {
            *existing = username;
            return false;
        }
        self.players.insert(user.clone(), username);
        self.player_statuses.insert(user, false);
        true
    }

    /// Removes a player, releasing their readiness if they had signalled.
    pub fn remove_player(&mut self, user: &UserId) -> Option<Departure> {
        self.players.remove(user)?;
        let was_ready = self.player_statuses.remove(user).unwrap_or(false);
        if was_ready {
            self.ready_count -= 1;
        }
        Some(Departure { was_ready })
    }

    /// Counts `user` as ready for the current round.
    pub fn mark_ready(&mut self, user: &UserId) -> Result<(), BarrierError> {
        let status = self
            .player_statuses
            .get_mut(user)
            .ok_or_else(|| BarrierError::UnknownPlayer(user.to_string()))?;
        if *status {
            return Err(BarrierError::AlreadyReady(user.to_string()));
        }
        *status = true;
        self.ready_count += 1;
        Ok(())
    }

    /// `readyCount == playerCount > 0`: the unique trigger of a phase transition.
    pub fn is_barrier_complete(&self) -> bool {
        self.ready_count > 0 && self.ready_count == self.players.len()
    }

    /// Clears every ready flag of the current round.
    pub fn reset_ready(&mut self) {
        self.ready_count = 0;
        for status in self.player_statuses.values_mut() {
            *status = false;
        }
    }

    /// Fires the transition if the barrier is complete: readiness is reset first,
    /// then the phase moves on. Returns the new phase.
    pub fn advance(&mut self) -> Option<Phase> {
        if !self.is_barrier_complete() {
            return None;
        }
        self.reset_ready();
        self.phase = self.phase.next();
        Some(self.phase)
    }

    /// Replaces the view with a store snapshot. Ready members that are no longer on
    /// the roster are ignored.
    pub fn sync(
        &mut self,
        players: HashMap<UserId, Username>,
        ready: &HashSet<UserId>,
        phase: Phase,
    ) {
        self.player_statuses = players
            .keys()
            .map(|user| (user.clone(), ready.contains(user)))
            .collect();
        self.ready_count = self.player_statuses.values().filter(|r| **r).count();
        self.players = players;
        self.phase = phase;
    }
}

/// Shuffles the round's answers so the voting page does not leak submission order.
pub fn shuffle_candidates<R: Rng + ?Sized>(answers: &mut [String], rng: &mut R) {
    answers.shuffle(rng);
}
