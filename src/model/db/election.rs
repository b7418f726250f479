//! Reference data owned by the election administrators.

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::election::ElectionStatus, mongodb::Id};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: ElectionStatus,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
}

impl Election {
    /// Is this election accepting votes at the given instant?
    pub fn is_admissible_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ElectionStatus::Active && self.start_time <= now && now <= self.end_time
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(rename = "_id")]
    pub id: Id,
    pub election_id: Id,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    pub position_id: Id,
    pub name: String,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub manifesto: Option<String>,
}


#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn admissibility_requires_active_status_and_window() {
        let now = Utc::now();
        assert!(Election::current_example().is_admissible_at(now));
        assert!(!Election::upcoming_example().is_admissible_at(now));
        assert!(!Election::expired_example().is_admissible_at(now));

        let election = Election::current_example();
        assert!(election.is_admissible_at(election.start_time));
        assert!(election.is_admissible_at(election.end_time));
        assert!(!election.is_admissible_at(election.end_time + Duration::seconds(1)));
    }
}
