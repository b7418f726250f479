use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::Result;
use crate::model::{
    common::election::ElectionStatus,
    db::election::{Candidate, Election, Position},
    mongodb::Id,
};

use super::ElectionRegistry;

#[derive(Default)]
struct Entries {
    elections: Vec<Election>,
    positions: Vec<Position>,
    candidates: Vec<Candidate>,
}

/// Election reference data held in process memory, kept in insertion order.
#[derive(Default)]
pub struct MemoryRegistry {
    entries: RwLock<Entries>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_election(&self, election: Election) {
        self.write().elections.push(election);
    }

    pub fn add_position(&self, position: Position) {
        self.write().positions.push(position);
    }

    pub fn add_candidate(&self, candidate: Candidate) {
        self.write().candidates.push(candidate);
    }

    /// Change an election's status. Returns false if there is no such election.
    pub fn set_status(&self, election_id: Id, status: ElectionStatus) -> bool {
        match self
            .write()
            .elections
            .iter_mut()
            .find(|e| e.id == election_id)
        {
            Some(election) => {
                election.status = status;
                true
            }
            None => false,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[rocket::async_trait]
impl ElectionRegistry for MemoryRegistry {
    async fn active_election(&self) -> Result<Option<Election>> {
        Ok(self
            .read()
            .elections
            .iter()
            .find(|e| e.status == ElectionStatus::Active)
            .cloned())
    }

    async fn position(&self, id: Id) -> Result<Option<Position>> {
        Ok(self.read().positions.iter().find(|p| p.id == id).cloned())
    }

    async fn candidate(&self, id: Id) -> Result<Option<Candidate>> {
        Ok(self.read().candidates.iter().find(|c| c.id == id).cloned())
    }

    async fn positions_for(&self, election_id: Id) -> Result<Vec<Position>> {
        Ok(self
            .read()
            .positions
            .iter()
            .filter(|p| p.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn candidates_for(&self, position_id: Id) -> Result<Vec<Candidate>> {
        Ok(self
            .read()
            .candidates
            .iter()
            .filter(|c| c.position_id == position_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rocket::async_test]
    async fn ballot_paper_nests_candidates() {
        let registry = MemoryRegistry::new();
        assert_eq!(registry.ballot_paper().await.unwrap(), None);

        let election = Election::current_example();
        let president = Position::example(&election, "President");
        let secretary = Position::example(&election, "Secretary");
        registry.add_election(Election::upcoming_example());
        registry.add_election(election.clone());
        registry.add_position(president.clone());
        registry.add_position(secretary.clone());
        registry.add_candidate(Candidate::example(&president, "Alice"));
        registry.add_candidate(Candidate::example(&president, "Bob"));

        let paper = registry.ballot_paper().await.unwrap().unwrap();
        assert_eq!(paper.election.id, election.id);
        assert_eq!(paper.positions.len(), 2);
        assert_eq!(paper.positions[0].id, president.id);
        assert_eq!(paper.positions[0].candidates.len(), 2);
        assert_eq!(paper.positions[1].id, secretary.id);
        assert!(paper.positions[1].candidates.is_empty());
    }

    #[rocket::async_test]
    async fn status_changes_move_the_active_election() {
        let registry = MemoryRegistry::new();
        let election = Election::current_example();
        registry.add_election(election.clone());
        assert!(registry.active_election().await.unwrap().is_some());

        assert!(registry.set_status(election.id, ElectionStatus::Closed));
        assert_eq!(registry.active_election().await.unwrap(), None);
        assert!(!registry.set_status(Id::new(), ElectionStatus::Active));
    }
}
