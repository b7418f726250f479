use std::collections::HashMap;

use mongodb::{bson::doc, Database};
use rocket::futures::TryStreamExt;
use serde::Deserialize;

use crate::error::Result;
use crate::model::{
    db::ballot::{Ballot, BallotDraft},
    mongodb::{duplicate_key_message, Coll, Id, UNIQUE_BIOMETRIC_INDEX},
};

use super::{BallotLedger, ConflictKind, InsertError};

/// Ballots in MongoDB. Relies on the unique indexes created by
/// [`crate::model::mongodb::ensure_indexes_exist`].
#[derive(Clone)]
pub struct MongoLedger {
    ballots: Coll<Ballot>,
}

impl MongoLedger {
    pub fn new(db: &Database) -> Self {
        Self {
            ballots: Coll::from_db(db),
        }
    }
}

/// One row of the per-candidate aggregation.
#[derive(Deserialize)]
struct CandidateCount {
    #[serde(rename = "_id")]
    candidate_id: Id,
    count: i64,
}

#[rocket::async_trait]
impl BallotLedger for MongoLedger {
    async fn find_by_identity(
        &self,
        position_id: Id,
        voter_primary_key: &str,
    ) -> Result<Option<Ballot>> {
        let filter = doc! {
            "position_id": position_id,
            "voter_primary_key": voter_primary_key,
        };
        Ok(self.ballots.find_one(filter, None).await?)
    }

    async fn find_by_biometric(
        &self,
        position_id: Id,
        biometric_digest: &str,
    ) -> Result<Option<Ballot>> {
        let filter = doc! {
            "position_id": position_id,
            "biometric_digest": biometric_digest,
        };
        Ok(self.ballots.find_one(filter, None).await?)
    }

    async fn insert(&self, draft: BallotDraft) -> std::result::Result<Ballot, InsertError> {
        let ballot = Ballot::from_draft(draft);
        match self.ballots.insert_one(&ballot, None).await {
            Ok(_) => Ok(ballot),
            Err(err) => match duplicate_key_message(&err) {
                Some(msg) if msg.contains(UNIQUE_BIOMETRIC_INDEX) => {
                    Err(InsertError::Conflict(ConflictKind::Biometric))
                }
                Some(_) => Err(InsertError::Conflict(ConflictKind::Identity)),
                None => Err(err.into()),
            },
        }
    }

    async fn count_by_candidate(&self, position_id: Id) -> Result<HashMap<Id, u64>> {
        let pipeline = [
            doc! { "$match": { "position_id": position_id } },
            doc! { "$group": { "_id": "$candidate_id", "count": { "$sum": 1 } } },
        ];
        let counts = self
            .ballots
            .aggregate(pipeline, None)
            .await?
            .with_type::<CandidateCount>()
            .map_ok(|row| (row.candidate_id, row.count.max(0) as u64))
            .try_collect::<HashMap<_, _>>()
            .await?;
        Ok(counts)
    }

    async fn count_by_device(&self, position_id: Id, device_token: &str) -> Result<u64> {
        let filter = doc! {
            "position_id": position_id,
            "device_token": device_token,
        };
        Ok(self.ballots.count_documents(filter, None).await?)
    }
}
