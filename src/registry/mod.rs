//! Read-only access to the elections, positions and candidates maintained by
//! the administrators.

use crate::error::Result;
use crate::model::{
    api::ballot_paper::{BallotPaper, PositionEntry},
    db::election::{Candidate, Election, Position},
    mongodb::Id,
};

mod memory;
mod mongo;

pub use memory::MemoryRegistry;
pub use mongo::MongoRegistry;

#[rocket::async_trait]
pub trait ElectionRegistry: Send + Sync {
    /// The election currently marked active, if any. Its time window is not
    /// checked here.
    async fn active_election(&self) -> Result<Option<Election>>;

    async fn position(&self, id: Id) -> Result<Option<Position>>;

    async fn candidate(&self, id: Id) -> Result<Option<Candidate>>;

    async fn positions_for(&self, election_id: Id) -> Result<Vec<Position>>;

    async fn candidates_for(&self, position_id: Id) -> Result<Vec<Candidate>>;

    /// The active election with its positions and their candidates.
    async fn ballot_paper(&self) -> Result<Option<BallotPaper>> {
        let election = match self.active_election().await? {
            Some(election) => election,
            None => return Ok(None),
        };
        let mut positions = Vec::new();
        for position in self.positions_for(election.id).await? {
            let candidates = self.candidates_for(position.id).await?;
            positions.push(PositionEntry::new(position, candidates));
        }
        Ok(Some(BallotPaper {
            election: election.into(),
            positions,
        }))
    }
}
