//! The append-only audit log of rejected duplicate vote attempts.

use crate::error::Result;
use crate::model::db::abuse::{AbuseEvent, AbuseRecord};

mod memory;
mod mongo;

pub use memory::MemoryAbuseLog;
pub use mongo::MongoAbuseLog;

#[rocket::async_trait]
pub trait AbuseRecorder: Send + Sync {
    /// Append one record for the given event.
    async fn record(&self, event: AbuseEvent) -> Result<AbuseRecord>;
}
