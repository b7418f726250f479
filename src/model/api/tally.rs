use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::mongodb::{serde_hex, serde_string_map, Id};

/// Vote counts for each candidate of a single position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionTally {
    #[serde(with = "serde_string_map")]
    candidates: HashMap<Id, u64>,
}

impl PositionTally {
    pub fn count(&self, candidate_id: Id) -> u64 {
        self.candidates.get(&candidate_id).copied().unwrap_or(0)
    }

    /// Total number of ballots cast for this position.
    pub fn total(&self) -> u64 {
        self.candidates.values().sum()
    }
}

impl From<HashMap<Id, u64>> for PositionTally {
    fn from(candidates: HashMap<Id, u64>) -> Self {
        Self { candidates }
    }
}

/// Per-position, per-candidate vote counts for one election.
///
/// Derived from the ballots; never a source of truth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TallyView {
    #[serde(with = "serde_string_map")]
    positions: HashMap<Id, PositionTally>,
}

impl TallyView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the counts for a position, replacing any previous ones.
    pub fn insert_position(&mut self, position_id: Id, tally: impl Into<PositionTally>) {
        self.positions.insert(position_id, tally.into());
    }

    pub fn position(&self, position_id: Id) -> Option<&PositionTally> {
        self.positions.get(&position_id)
    }

    pub fn count(&self, position_id: Id, candidate_id: Id) -> u64 {
        self.position(position_id)
            .map(|tally| tally.count(candidate_id))
            .unwrap_or(0)
    }

    /// Apply an incremental update.
    ///
    /// Returns false, leaving the view untouched, if the position is not part
    /// of this view.
    pub fn apply(&mut self, update: &TallyUpdate) -> bool {
        match self.positions.get_mut(&update.position_id) {
            Some(tally) => {
                let count = tally.candidates.entry(update.candidate_id).or_insert(0);
                *count = count.saturating_add_signed(update.delta);
                true
            }
            None => false,
        }
    }
}

/// An incremental change to a single candidate's count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyUpdate {
    #[serde(with = "serde_hex")]
    pub position_id: Id,
    #[serde(with = "serde_hex")]
    pub candidate_id: Id,
    pub delta: i64,
}

impl TallyUpdate {
    /// The update for one newly recorded ballot.
    pub fn increment(position_id: Id, candidate_id: Id) -> Self {
        Self {
            position_id,
            candidate_id,
            delta: 1,
        }
    }
}

/// The full tally of an election, as delivered to a newly connected observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallySnapshot {
    #[serde(with = "serde_hex")]
    pub election_id: Id,
    pub snapshot: TallyView,
}

/// Reply to the "active election changed" hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveElectionChanged {
    /// The election whose tally is now followed, as a hex string.
    pub election_id: Option<String>,
}

impl From<Option<Id>> for ActiveElectionChanged {
    fn from(election_id: Option<Id>) -> Self {
        Self {
            election_id: election_id.map(|id| id.to_string()),
        }
    }
}
