use mongodb::{bson::doc, options::FindOptions, Database};
use rocket::futures::TryStreamExt;

use crate::error::Result;
use crate::model::{
    common::election::ElectionStatus,
    db::election::{Candidate, Election, Position},
    mongodb::{Coll, Id},
};

use super::ElectionRegistry;

/// Election reference data in MongoDB.
#[derive(Clone)]
pub struct MongoRegistry {
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
}

impl MongoRegistry {
    pub fn new(db: &Database) -> Self {
        Self {
            elections: Coll::from_db(db),
            positions: Coll::from_db(db),
            candidates: Coll::from_db(db),
        }
    }
}

/// Keep listings in a stable order.
fn by_id() -> FindOptions {
    FindOptions::builder().sort(doc! {"_id": 1}).build()
}

#[rocket::async_trait]
impl ElectionRegistry for MongoRegistry {
    async fn active_election(&self) -> Result<Option<Election>> {
        let filter = doc! { "status": ElectionStatus::Active };
        Ok(self.elections.find_one(filter, None).await?)
    }

    async fn position(&self, id: Id) -> Result<Option<Position>> {
        Ok(self.positions.find_one(id.as_doc(), None).await?)
    }

    async fn candidate(&self, id: Id) -> Result<Option<Candidate>> {
        Ok(self.candidates.find_one(id.as_doc(), None).await?)
    }

    async fn positions_for(&self, election_id: Id) -> Result<Vec<Position>> {
        let filter = doc! { "election_id": election_id };
        Ok(self
            .positions
            .find(filter, by_id())
            .await?
            .try_collect()
            .await?)
    }

    async fn candidates_for(&self, position_id: Id) -> Result<Vec<Candidate>> {
        let filter = doc! { "position_id": position_id };
        Ok(self
            .candidates
            .find(filter, by_id())
            .await?
            .try_collect()
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use mongodb::Database;

    use super::*;
    use crate::registry::ElectionRegistry;

    #[backend_test]
    #[ignore = "requires MongoDB at ROCKET_DB_URI"]
    async fn reads_reference_data(
        db: Database,
        elections: Coll<Election>,
        positions: Coll<Position>,
        candidates: Coll<Candidate>,
    ) {
        let current = Election::current_example();
        elections
            .insert_many([Election::upcoming_example(), current.clone()], None)
            .await
            .unwrap();
        let president = Position::example(&current, "President");
        positions.insert_one(&president, None).await.unwrap();
        let alice = Candidate::example(&president, "Alice");
        candidates.insert_one(&alice, None).await.unwrap();

        let registry = MongoRegistry::new(&db);
        // Stored times lose sub-millisecond precision, so compare IDs.
        let active = registry.active_election().await.unwrap().unwrap();
        assert_eq!(active.id, current.id);
        assert_eq!(
            registry.position(president.id).await.unwrap(),
            Some(president.clone())
        );
        assert_eq!(registry.candidate(alice.id).await.unwrap(), Some(alice));

        let paper = registry.ballot_paper().await.unwrap().unwrap();
        assert_eq!(paper.positions.len(), 1);
        assert_eq!(paper.positions[0].candidates[0].name, "Alice");
    }
}
