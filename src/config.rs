use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::identity::IdentityHasher;
use crate::model::mongodb::ensure_indexes_exist;
use crate::pipeline::AdmissionPolicy;
use crate::ratelimit::AttemptLimiter;
use crate::tally::TallyBroadcaster;
use crate::Backends;

/// Matriculation numbers, e.g. `CSC/20/01/0001`.
pub const DEFAULT_VOTER_KEY_PATTERN: &str = r"^[A-Z]{3}/\d{2}/\d{2}/\d{4}$";

/// Submissions per client address and window. Every position on the ballot
/// is a separate submission, so this leaves room for a long ballot with
/// retries from several voters sharing one address.
pub const DEFAULT_VOTE_ATTEMPT_LIMIT: u32 = 60;

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    // non-secrets
    voter_key_pattern: String,
    device_vote_limit: Option<u32>,
    abuse_record_timeout_ms: u64,
    vote_attempt_limit: u32,
    vote_attempt_window: u64,
    tally_channel_capacity: usize,
    // secrets
    biometric_pepper: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            voter_key_pattern: DEFAULT_VOTER_KEY_PATTERN.to_string(),
            device_vote_limit: None,
            abuse_record_timeout_ms: 2000,
            vote_attempt_limit: DEFAULT_VOTE_ATTEMPT_LIMIT,
            vote_attempt_window: 600,
            tally_channel_capacity: 1024,
            biometric_pepper: None,
        }
    }
}

impl Config {
    /// Regular expression every voter primary key must match.
    pub fn voter_key_pattern(&self) -> &str {
        &self.voter_key_pattern
    }

    /// Maximum ballots per device token and position, if limited.
    pub fn device_vote_limit(&self) -> Option<u32> {
        self.device_vote_limit
    }

    /// How long a rejection waits for its abuse record to be written.
    pub fn abuse_record_timeout(&self) -> Duration {
        Duration::from_millis(self.abuse_record_timeout_ms)
    }

    /// Vote attempts allowed per client address within the window.
    pub fn vote_attempt_limit(&self) -> u32 {
        self.vote_attempt_limit
    }

    /// Length of the attempt window in seconds.
    pub fn vote_attempt_window(&self) -> Duration {
        Duration::from_secs(self.vote_attempt_window)
    }

    /// Updates a tally observer may fall behind by before resynchronising.
    pub fn tally_channel_capacity(&self) -> usize {
        self.tally_channel_capacity
    }

    /// Secret key for biometric digests.
    pub fn biometric_pepper(&self) -> Option<&[u8]> {
        self.biometric_pepper
            .as_deref()
            .filter(|pepper| !pepper.is_empty())
            .map(str::as_bytes)
    }
}

/// A fairing that loads the application config and puts it in managed state,
/// along with everything built from it: the admission policy, the identity
/// hasher, the attempt limiter and the tally broadcaster.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let policy = match AdmissionPolicy::from_config(&config) {
            Ok(policy) => policy,
            Err(e) => {
                error!("Invalid `voter_key_pattern`: {e}");
                return Err(rocket);
            }
        };
        if config.biometric_pepper().is_none() {
            info!("No biometric pepper configured, using unkeyed digests");
        }

        // Manage the state.
        rocket = rocket
            .manage(policy)
            .manage(IdentityHasher::from_config(&config))
            .manage(AttemptLimiter::from_config(&config))
            .manage(Arc::new(TallyBroadcaster::new(
                config.tally_channel_capacity(),
            )))
            .manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// ensures the ledger's indexes exist, and places the `Client`, the
/// `Database` and the storage [`Backends`] into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        // Ensure the uniqueness constraints exist before any ballot is accepted.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to create database indexes: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        let backends = Backends::mongo(&db);
        rocket = rocket.manage(client).manage(db).manage(backends);
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "evote".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
fn get_database_name() -> String {
    let db = crate::database();
    info!("Using database {db}");
    db
}
