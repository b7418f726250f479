use mongodb::Database;

use crate::error::Result;
use crate::model::{
    db::abuse::{AbuseEvent, AbuseRecord},
    mongodb::Coll,
};

use super::AbuseRecorder;

#[derive(Clone)]
pub struct MongoAbuseLog {
    records: Coll<AbuseRecord>,
}

impl MongoAbuseLog {
    pub fn new(db: &Database) -> Self {
        Self {
            records: Coll::from_db(db),
        }
    }
}

#[rocket::async_trait]
impl AbuseRecorder for MongoAbuseLog {
    async fn record(&self, event: AbuseEvent) -> Result<AbuseRecord> {
        let record = AbuseRecord::new(event);
        self.records.insert_one(&record, None).await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use mongodb::Database;

    use super::*;
    use crate::model::common::reason::ReasonCode;

    #[backend_test]
    #[ignore = "requires MongoDB at ROCKET_DB_URI"]
    async fn appends_records(db: Database, records: Coll<AbuseRecord>) {
        let log = MongoAbuseLog::new(&db);
        let event = AbuseEvent {
            voter_primary_key: Some("CSC/20/01/0001".to_string()),
            biometric_digest: None,
            biometric_kind: None,
            device_token: Some("dev1".to_string()),
            origin_address: "10.0.0.7".to_string(),
            user_agent: None,
            reason_code: ReasonCode::DuplicateIdentity,
        };

        let written = log.record(event.clone()).await.unwrap();
        log.record(event.clone()).await.unwrap();

        assert_eq!(records.count_documents(None, None).await.unwrap(), 2);
        let stored = records
            .find_one(written.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.event, event);
    }
}
