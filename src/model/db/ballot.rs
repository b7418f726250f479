use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::biometric::BiometricKind, mongodb::Id};

/// Core ballot data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotCore {
    /// Institution-issued voter identifier.
    pub voter_primary_key: String,
    /// One-way digest of the voter's biometric payload, if one was presented.
    pub biometric_digest: Option<String>,
    pub biometric_kind: BiometricKind,
    /// Fallback identity for voters without a biometric.
    pub device_token: Option<String>,
    /// Foreign Key position ID.
    pub position_id: Id,
    /// Foreign Key candidate ID.
    pub candidate_id: Id,
    /// Network address the vote came from.
    pub origin_address: String,
    pub user_agent: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}

/// A ballot that has not been recorded yet.
pub type BallotDraft = BallotCore;

/// A ballot from the database, with its unique ID.
///
/// Ballots are written exactly once and never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub ballot: BallotCore,
}

impl Ballot {
    /// Assign a fresh ID to a draft.
    pub fn from_draft(draft: BallotDraft) -> Self {
        Self {
            id: Id::new(),
            ballot: draft,
        }
    }
}

impl Deref for Ballot {
    type Target = BallotCore;

    fn deref(&self) -> &Self::Target {
        &self.ballot
    }
}
