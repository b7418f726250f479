use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{
    abuse::AbuseRecord,
    ballot::Ballot,
    election::{Candidate, Election, Position},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Collections owned by the voting core.
impl MongoCollection for Ballot {
    const NAME: &'static str = "ballots";
}
impl MongoCollection for AbuseRecord {
    const NAME: &'static str = "abuse_logs";
}

// Collections owned by the election administrators; read-only here.
impl MongoCollection for Election {
    const NAME: &'static str = "elections";
}
impl MongoCollection for Position {
    const NAME: &'static str = "positions";
}
impl MongoCollection for Candidate {
    const NAME: &'static str = "candidates";
}

/// Name of the index enforcing one ballot per voter per position.
pub const UNIQUE_VOTE_INDEX: &str = "unique_vote";

/// Name of the index enforcing one ballot per biometric digest per position.
pub const UNIQUE_BIOMETRIC_INDEX: &str = "unique_biometric";

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let ballots = Coll::<Ballot>::from_db(db);

    let unique_vote = IndexModel::builder()
        .keys(doc! {"voter_primary_key": 1, "position_id": 1})
        .options(
            IndexOptions::builder()
                .name(UNIQUE_VOTE_INDEX.to_string())
                .unique(true)
                .build(),
        )
        .build();
    ballots.create_index(unique_vote, None).await?;

    // Ballots without a biometric digest store `null`, which must not collide.
    let unique_biometric = IndexModel::builder()
        .keys(doc! {"biometric_digest": 1, "position_id": 1})
        .options(
            IndexOptions::builder()
                .name(UNIQUE_BIOMETRIC_INDEX.to_string())
                .unique(true)
                .partial_filter_expression(doc! {"biometric_digest": {"$type": "string"}})
                .build(),
        )
        .build();
    ballots.create_index(unique_biometric, None).await?;

    let tally_lookup = IndexModel::builder()
        .keys(doc! {"position_id": 1, "candidate_id": 1})
        .options(
            IndexOptions::builder()
                .name("tally_lookup".to_string())
                .build(),
        )
        .build();
    ballots.create_index(tally_lookup, None).await?;

    let device_lookup = IndexModel::builder()
        .keys(doc! {"position_id": 1, "device_token": 1})
        .options(
            IndexOptions::builder()
                .name("device_lookup".to_string())
                .build(),
        )
        .build();
    ballots.create_index(device_lookup, None).await?;

    let abuse_by_time = IndexModel::builder()
        .keys(doc! {"occurred_at": -1})
        .build();
    Coll::<AbuseRecord>::from_db(db)
        .create_index(abuse_by_time, None)
        .await?;

    Ok(())
}
