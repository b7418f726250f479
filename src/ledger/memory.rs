use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::model::{
    db::ballot::{Ballot, BallotDraft},
    mongodb::Id,
};

use super::{BallotLedger, ConflictKind, InsertError};

/// Ballots held in process memory. Inserts check and write under a single
/// lock, so the uniqueness rules hold under any interleaving.
#[derive(Default)]
pub struct MemoryLedger {
    ballots: Mutex<Vec<Ballot>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every recorded ballot, in insertion order.
    pub fn ballots(&self) -> Vec<Ballot> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Ballot>> {
        self.ballots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Biometric conflicts take precedence over identity conflicts.
fn conflict_with(draft: &BallotDraft, existing: &[Ballot]) -> Option<ConflictKind> {
    let mut identity = false;
    for rival in existing.iter().filter(|b| b.position_id == draft.position_id) {
        if draft.biometric_digest.is_some() && rival.biometric_digest == draft.biometric_digest {
            return Some(ConflictKind::Biometric);
        }
        identity |= rival.voter_primary_key == draft.voter_primary_key;
    }
    identity.then_some(ConflictKind::Identity)
}

#[rocket::async_trait]
impl BallotLedger for MemoryLedger {
    async fn find_by_identity(
        &self,
        position_id: Id,
        voter_primary_key: &str,
    ) -> Result<Option<Ballot>> {
        Ok(self
            .lock()
            .iter()
            .find(|b| b.position_id == position_id && b.voter_primary_key == voter_primary_key)
            .cloned())
    }

    async fn find_by_biometric(
        &self,
        position_id: Id,
        biometric_digest: &str,
    ) -> Result<Option<Ballot>> {
        Ok(self
            .lock()
            .iter()
            .find(|b| {
                b.position_id == position_id
                    && b.biometric_digest.as_deref() == Some(biometric_digest)
            })
            .cloned())
    }

    async fn insert(&self, draft: BallotDraft) -> std::result::Result<Ballot, InsertError> {
        let mut ballots = self.lock();
        if let Some(kind) = conflict_with(&draft, &ballots) {
            return Err(InsertError::Conflict(kind));
        }
        let ballot = Ballot::from_draft(draft);
        ballots.push(ballot.clone());
        Ok(ballot)
    }

    async fn count_by_candidate(&self, position_id: Id) -> Result<HashMap<Id, u64>> {
        let mut counts = HashMap::new();
        for ballot in self.lock().iter().filter(|b| b.position_id == position_id) {
            *counts.entry(ballot.candidate_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn count_by_device(&self, position_id: Id, device_token: &str) -> Result<u64> {
        Ok(self
            .lock()
            .iter()
            .filter(|b| {
                b.position_id == position_id && b.device_token.as_deref() == Some(device_token)
            })
            .count() as u64)
    }
}
