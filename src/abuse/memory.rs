use std::sync::{Mutex, PoisonError};

use crate::error::Result;
use crate::model::db::abuse::{AbuseEvent, AbuseRecord};

use super::AbuseRecorder;

#[derive(Default)]
pub struct MemoryAbuseLog {
    records: Mutex<Vec<AbuseRecord>>,
}

impl MemoryAbuseLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every record, oldest first.
    pub fn records(&self) -> Vec<AbuseRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[rocket::async_trait]
impl AbuseRecorder for MemoryAbuseLog {
    async fn record(&self, event: AbuseEvent) -> Result<AbuseRecord> {
        let record = AbuseRecord::new(event);
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(record)
    }
}
