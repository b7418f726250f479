use std::sync::Arc;

use log::warn;
use rocket::{
    serde::json::{self, Json},
    Route, State,
};

use crate::error::Result;
use crate::identity::IdentityHasher;
use crate::model::api::{
    admission::Admission,
    connection::ConnectionMeta,
    submission::{MalformedSubmission, VoteSubmission},
};
use crate::pipeline::{AdmissionPolicy, VotePipeline};
use crate::ratelimit::{AttemptPermit, TooManyAttempts};
use crate::tally::TallyBroadcaster;
use crate::Backends;

pub fn routes() -> Vec<Route> {
    routes![submit_vote]
}

#[allow(clippy::too_many_arguments)]
#[post("/submit-vote", data = "<submission>")]
async fn submit_vote(
    permit: std::result::Result<AttemptPermit, TooManyAttempts>,
    meta: ConnectionMeta,
    submission: std::result::Result<Json<VoteSubmission>, json::Error<'_>>,
    backends: &State<Backends>,
    hasher: &State<IdentityHasher>,
    policy: &State<AdmissionPolicy>,
    broadcaster: &State<Arc<TallyBroadcaster>>,
) -> Result<Admission> {
    if let Err(e) = permit {
        warn!("req{} {e}", meta.request_id);
        return Ok(Admission::TooManyAttempts);
    }
    let submission = match submission {
        Ok(Json(submission)) => submission,
        Err(e) => {
            warn!("req{} Unreadable submission: {e}", meta.request_id);
            return Ok(Admission::Malformed(MalformedSubmission::Unparsable(
                e.to_string(),
            )));
        }
    };

    VotePipeline::new(backends, hasher, policy, broadcaster)
        .admit(submission, &meta)
        .await
}
