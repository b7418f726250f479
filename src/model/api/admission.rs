use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    api::submission::MalformedSubmission, common::reason::ReasonCode, db::ballot::Ballot,
    mongodb::Id,
};

/// Reason code reported for submissions outside an admissible election.
pub const INELIGIBLE_ELECTION: &str = "ineligible_election";

/// Reason code reported when a caller exceeds the attempt limit.
pub const TOO_MANY_ATTEMPTS: &str = "too_many_attempts";

/// Why a well-formed submission cannot be counted in the current election.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Ineligibility {
    #[error("No election is currently active")]
    NoActiveElection,
    #[error("Position '{0}' does not exist")]
    UnknownPosition(Id),
    #[error("Position '{0}' does not belong to the active election")]
    PositionNotInActiveElection(Id),
    #[error("Candidate '{0}' does not exist")]
    UnknownCandidate(Id),
    #[error("Candidate '{candidate}' is not standing for position '{position}'")]
    CandidateNotForPosition { candidate: Id, position: Id },
    #[error("Voting is not open")]
    ElectionNotOpen,
}

impl Ineligibility {
    pub fn status(&self) -> Status {
        match self {
            Self::NoActiveElection | Self::UnknownPosition(_) | Self::UnknownCandidate(_) => {
                Status::NotFound
            }
            Self::PositionNotInActiveElection(_)
            | Self::CandidateNotForPosition { .. }
            | Self::ElectionNotOpen => Status::Forbidden,
        }
    }
}

/// The terminal outcome of one vote submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The vote was recorded.
    Accepted(Ballot),
    /// The voter (or their biometric or device) has already been used.
    Rejected(ReasonCode),
    /// The submission was structurally unacceptable.
    Malformed(MalformedSubmission),
    /// The submission does not target the open election.
    Ineligible(Ineligibility),
    /// The caller has made too many attempts recently.
    TooManyAttempts,
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Accepted(_) => Status::Ok,
            Self::Rejected(_) => Status::Forbidden,
            Self::Malformed(_) => Status::BadRequest,
            Self::Ineligible(reason) => reason.status(),
            Self::TooManyAttempts => Status::TooManyRequests,
        }
    }
}

/// The JSON body returned for a vote submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ballot_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AdmissionResponse {
    fn rejected(reason_code: &str, message: String) -> Self {
        Self {
            accepted: false,
            ballot_id: None,
            reason_code: Some(reason_code.to_string()),
            message: Some(message),
        }
    }
}

impl From<&Admission> for AdmissionResponse {
    fn from(admission: &Admission) -> Self {
        match admission {
            Admission::Accepted(ballot) => Self {
                accepted: true,
                ballot_id: Some(ballot.id.to_string()),
                reason_code: None,
                message: None,
            },
            Admission::Rejected(reason) => Self::rejected(reason.as_str(), rejection_message(*reason)),
            Admission::Malformed(err) => Self::rejected(
                ReasonCode::MalformedSubmission.as_str(),
                err.to_string(),
            ),
            Admission::Ineligible(reason) => Self::rejected(INELIGIBLE_ELECTION, reason.to_string()),
            Admission::TooManyAttempts => Self::rejected(
                TOO_MANY_ATTEMPTS,
                "Too many voting attempts, please try again later".to_string(),
            ),
        }
    }
}

fn rejection_message(reason: ReasonCode) -> String {
    match reason {
        ReasonCode::DuplicateIdentity => "You have already voted for this position",
        ReasonCode::DuplicateBiometric => "This biometric has already been used to vote for this position",
        ReasonCode::DeviceLimitExceeded => "This device has already been used too many times for this position",
        ReasonCode::MalformedSubmission => "Malformed submission",
    }
    .to_string()
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Admission {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let body = AdmissionResponse::from(&self);
        (self.status(), Json(body)).respond_to(req)
    }
}
