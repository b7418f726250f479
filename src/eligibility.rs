use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{
    api::admission::Ineligibility,
    db::election::{Candidate, Election, Position},
    mongodb::Id,
};
use crate::registry::ElectionRegistry;

/// The reference data a submission was found to target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eligible {
    pub election: Election,
    pub position: Position,
    pub candidate: Candidate,
}

/// Decide whether a vote for `candidate_id` in `position_id` may be counted at
/// `now`: there must be an active election whose window contains `now`, the
/// position must belong to it, and the candidate to the position.
pub async fn check_eligibility(
    registry: &dyn ElectionRegistry,
    position_id: Id,
    candidate_id: Id,
    now: DateTime<Utc>,
) -> Result<std::result::Result<Eligible, Ineligibility>> {
    let election = match registry.active_election().await? {
        Some(election) => election,
        None => return Ok(Err(Ineligibility::NoActiveElection)),
    };
    if !election.is_admissible_at(now) {
        return Ok(Err(Ineligibility::ElectionNotOpen));
    }

    let position = match registry.position(position_id).await? {
        Some(position) => position,
        None => return Ok(Err(Ineligibility::UnknownPosition(position_id))),
    };
    if position.election_id != election.id {
        return Ok(Err(Ineligibility::PositionNotInActiveElection(position_id)));
    }

    let candidate = match registry.candidate(candidate_id).await? {
        Some(candidate) => candidate,
        None => return Ok(Err(Ineligibility::UnknownCandidate(candidate_id))),
    };
    if candidate.position_id != position.id {
        return Ok(Err(Ineligibility::CandidateNotForPosition {
            candidate: candidate_id,
            position: position_id,
        }));
    }

    Ok(Ok(Eligible {
        election,
        position,
        candidate,
    }))
}
