use std::fmt::{Display, Formatter};

use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// Why a vote attempt was turned away.
///
/// The first three are abuse: they are recorded in the abuse log as well as
/// reported to the caller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    DuplicateIdentity,
    DuplicateBiometric,
    DeviceLimitExceeded,
    MalformedSubmission,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateIdentity => "duplicate_identity",
            Self::DuplicateBiometric => "duplicate_biometric",
            Self::DeviceLimitExceeded => "device_limit_exceeded",
            Self::MalformedSubmission => "malformed_submission",
        }
    }
}

impl Display for ReasonCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ReasonCode> for Bson {
    fn from(reason: ReasonCode) -> Self {
        to_bson(&reason).expect("Serialisation is infallible")
    }
}
