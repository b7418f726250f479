#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use std::sync::Arc;

use mongodb::Database;
use rocket::{Build, Rocket};

use crate::abuse::{AbuseRecorder, MongoAbuseLog};
use crate::config::{ConfigFairing, DatabaseFairing};
use crate::ledger::{BallotLedger, MongoLedger};
use crate::logging::LoggerFairing;
use crate::registry::{ElectionRegistry, MongoRegistry};
use crate::tally::TallyFairing;

pub mod abuse;
pub mod api;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod ratelimit;
pub mod registry;
pub mod tally;

/// The storage the voting core runs against. Placed into managed state.
#[derive(Clone)]
pub struct Backends {
    pub ledger: Arc<dyn BallotLedger>,
    pub registry: Arc<dyn ElectionRegistry>,
    pub abuse: Arc<dyn AbuseRecorder>,
}

impl Backends {
    /// Backends persisting to the given MongoDB database.
    pub fn mongo(db: &Database) -> Self {
        Self {
            ledger: Arc::new(MongoLedger::new(db)),
            registry: Arc::new(MongoRegistry::new(db)),
            abuse: Arc::new(MongoAbuseLog::new(db)),
        }
    }
}

/// The production server, backed by the database named in the config.
pub fn build() -> Rocket<Build> {
    core(rocket::build()).attach(DatabaseFairing)
}

/// A server running against the given backends instead of a configured
/// database.
pub fn rocket_with_backends(rocket: Rocket<Build>, backends: Backends) -> Rocket<Build> {
    core(rocket).manage(backends)
}

fn core(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(TallyFairing)
        .mount("/", api::routes())
        .register("/", api::catchers())
}

/// A MongoDB client for tests, connected to `ROCKET_DB_URI`.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let uri = std::env::var("ROCKET_DB_URI")
        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    mongodb::Client::with_uri_str(uri).await.unwrap()
}

/// A fresh database name for one test.
#[cfg(test)]
pub(crate) fn database() -> String {
    let random: u32 = rand::random();
    format!("test{random}")
}

/// A test server backed by the given database.
#[cfg(test)]
pub(crate) async fn rocket_for_db(db: &Database) -> Rocket<Build> {
    model::mongodb::ensure_indexes_exist(db).await.unwrap();
    rocket_with_backends(rocket::build(), Backends::mongo(db))
}

/// Insert an active election with a "President" position and two candidates.
#[cfg(test)]
pub(crate) async fn seed_database(db: &Database) {
    use model::{
        db::election::{Candidate, Election, Position},
        mongodb::Coll,
    };

    let election = Election::current_example();
    let president = Position::example(&election, "President");
    Coll::<Election>::from_db(db)
        .insert_one(&election, None)
        .await
        .unwrap();
    Coll::<Candidate>::from_db(db)
        .insert_many(
            [
                Candidate::example(&president, "Alice"),
                Candidate::example(&president, "Bob"),
            ],
            None,
        )
        .await
        .unwrap();
    Coll::<Position>::from_db(db)
        .insert_one(&president, None)
        .await
        .unwrap();
}
