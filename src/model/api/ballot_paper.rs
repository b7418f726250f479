use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::election::ElectionStatus,
    db::election::{Candidate, Election, Position},
    mongodb::{serde_hex, Id},
};

/// Public view of an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSummary {
    #[serde(with = "serde_hex")]
    pub id: Id,
    pub title: String,
    pub description: Option<String>,
    pub status: ElectionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl From<Election> for ElectionSummary {
    fn from(election: Election) -> Self {
        Self {
            id: election.id,
            title: election.title,
            description: election.description,
            status: election.status,
            start_time: election.start_time,
            end_time: election.end_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateEntry {
    #[serde(with = "serde_hex")]
    pub id: Id,
    pub name: String,
    pub photo: Option<String>,
    pub manifesto: Option<String>,
}

impl From<Candidate> for CandidateEntry {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id,
            name: candidate.name,
            photo: candidate.photo,
            manifesto: candidate.manifesto,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionEntry {
    #[serde(with = "serde_hex")]
    pub id: Id,
    pub name: String,
    pub candidates: Vec<CandidateEntry>,
}

impl PositionEntry {
    pub fn new(position: Position, candidates: Vec<Candidate>) -> Self {
        Self {
            id: position.id,
            name: position.name,
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }
}

/// Everything a voter needs to fill in their ballot: the active election and
/// its positions, each with its candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotPaper {
    pub election: ElectionSummary,
    pub positions: Vec<PositionEntry>,
}
