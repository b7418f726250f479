//! The durable store of accepted ballots.
//!
//! Uniqueness of `(voter, position)` and `(biometric digest, position)` is
//! enforced by [`BallotLedger::insert`] itself, atomically; lookups are only
//! a fast path for friendly rejections.

use std::collections::HashMap;

use mongodb::error::Error as DbError;
use thiserror::Error;

use crate::error::{Error, Result};
use crate::model::{
    db::ballot::{Ballot, BallotDraft},
    mongodb::Id,
};

mod memory;
mod mongo;

pub use memory::MemoryLedger;
pub use mongo::MongoLedger;

/// Which uniqueness rule an insert violated.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    /// A ballot exists for the same voter and position.
    Identity,
    /// A ballot exists for the same biometric digest and position.
    Biometric,
}

#[derive(Debug, Error)]
pub enum InsertError {
    #[error("A ballot already exists for this position ({0:?} conflict)")]
    Conflict(ConflictKind),
    #[error(transparent)]
    Storage(#[from] Error),
}

impl From<DbError> for InsertError {
    fn from(err: DbError) -> Self {
        Self::Storage(err.into())
    }
}

#[rocket::async_trait]
pub trait BallotLedger: Send + Sync {
    async fn find_by_identity(
        &self,
        position_id: Id,
        voter_primary_key: &str,
    ) -> Result<Option<Ballot>>;

    async fn find_by_biometric(
        &self,
        position_id: Id,
        biometric_digest: &str,
    ) -> Result<Option<Ballot>>;

    /// Record a ballot, failing with [`InsertError::Conflict`] if it would
    /// break either uniqueness rule, including against concurrent inserts.
    async fn insert(&self, draft: BallotDraft) -> std::result::Result<Ballot, InsertError>;

    /// Number of ballots per candidate for the given position. Candidates
    /// without votes are absent.
    async fn count_by_candidate(&self, position_id: Id) -> Result<HashMap<Id, u64>>;

    /// Number of ballots cast from the given device for the given position.
    async fn count_by_device(&self, position_id: Id, device_token: &str) -> Result<u64>;
}
