use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{biometric::BiometricKind, reason::ReasonCode},
    mongodb::Id,
};

/// A rejected vote attempt, with whatever identifying context was available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbuseEvent {
    pub voter_primary_key: Option<String>,
    pub biometric_digest: Option<String>,
    pub biometric_kind: Option<BiometricKind>,
    pub device_token: Option<String>,
    pub origin_address: String,
    pub user_agent: Option<String>,
    pub reason_code: ReasonCode,
}

/// An entry in the abuse log. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbuseRecord {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub event: AbuseEvent,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub occurred_at: DateTime<Utc>,
}

impl AbuseRecord {
    /// Stamp an event with an ID and the current time.
    pub fn new(event: AbuseEvent) -> Self {
        Self {
            id: Id::new(),
            event,
            occurred_at: Utc::now(),
        }
    }
}

impl Deref for AbuseRecord {
    type Target = AbuseEvent;

    fn deref(&self) -> &Self::Target {
        &self.event
    }
}
