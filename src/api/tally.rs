use std::sync::Arc;

use log::{info, warn};
use rocket::{
    response::stream::{Event, EventStream},
    serde::json::Json,
    tokio::{select, sync::broadcast::error::RecvError},
    Route, Shutdown, State,
};

use crate::error::{Error, Result};
use crate::model::api::tally::{ActiveElectionChanged, TallySnapshot};
use crate::tally::TallyBroadcaster;
use crate::Backends;

/// Sent once per connection, and again after a resynchronisation.
const INIT_EVENT: &str = "tally:init";
/// Sent for every accepted ballot.
const UPDATE_EVENT: &str = "tally:update";

pub fn routes() -> Vec<Route> {
    routes![tally, tally_stream, active_election_changed]
}

#[get("/tally")]
async fn tally(
    backends: &State<Backends>,
    broadcaster: &State<Arc<TallyBroadcaster>>,
) -> Result<Json<TallySnapshot>> {
    let snapshot = broadcaster
        .snapshot(backends)
        .await?
        .ok_or_else(|| Error::not_found("Active election"))?;
    Ok(Json(snapshot))
}

/// Follow the tally of the active election as server-sent events.
///
/// The stream ends when the active election changes or the server shuts
/// down; clients reconnect to follow the new election.
#[get("/tally/stream")]
async fn tally_stream(
    backends: &State<Backends>,
    broadcaster: &State<Arc<TallyBroadcaster>>,
    mut shutdown: Shutdown,
) -> Result<EventStream![]> {
    let broadcaster = Arc::clone(broadcaster);
    let subscription = broadcaster
        .subscribe(backends)
        .await?
        .ok_or_else(|| Error::not_found("Active election"))?;

    Ok(EventStream! {
        let mut subscription = subscription;
        let election_id = subscription.snapshot.election_id;
        'stream: loop {
            yield Event::json(&subscription.snapshot).event(INIT_EVENT);
            loop {
                let update = select! {
                    update = subscription.updates.recv() => update,
                    _ = &mut shutdown => break 'stream,
                };
                match update {
                    Ok(update) => yield Event::json(&update).event(UPDATE_EVENT),
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Tally observer missed {missed} updates, resynchronising");
                        match broadcaster.resubscribe(election_id) {
                            Some(fresh) => {
                                subscription = fresh;
                                continue 'stream;
                            }
                            None => break 'stream,
                        }
                    }
                    Err(RecvError::Closed) => break 'stream,
                }
            }
        }
    })
}

/// Called by the administrators whenever an election is activated or closed.
#[post("/hooks/active-election-changed")]
async fn active_election_changed(
    backends: &State<Backends>,
    broadcaster: &State<Arc<TallyBroadcaster>>,
) -> Result<Json<ActiveElectionChanged>> {
    let election_id = broadcaster.active_election_changed(backends).await?;
    match election_id {
        Some(id) => info!("Tally now follows election {id}"),
        None => info!("Tally suspended, no election is active"),
    }
    Ok(Json(election_id.into()))
}

#[cfg(test)]
mod tests {
    use rocket::http::Status;

    use super::*;
    use crate::api::test_server::TestServer;
    use crate::model::{
        api::submission::VoteSubmission,
        common::election::ElectionStatus,
        db::election::{Election, Position},
    };

    async fn vote(server: &TestServer, voter: &str, candidate: crate::model::mongodb::Id) {
        let submission = VoteSubmission::example(voter, server.president.id, candidate);
        let response = server
            .client
            .post("/submit-vote")
            .json(&submission)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
    }

    #[rocket::async_test]
    async fn snapshot_counts_ballots() {
        let server = TestServer::new().await;
        vote(&server, "CSC/20/01/0001", server.alice.id).await;
        vote(&server, "CSC/20/01/0002", server.alice.id).await;

        let response = server.client.get(uri!(tally)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let snapshot = response.into_json::<TallySnapshot>().await.unwrap();

        assert_eq!(snapshot.election_id, server.election.id);
        let president = snapshot.snapshot.position(server.president.id).unwrap();
        assert_eq!(president.count(server.alice.id), 2);
        assert_eq!(president.count(server.bob.id), 0);
        assert_eq!(president.total(), 2);
    }

    #[rocket::async_test]
    async fn stream_sends_snapshot_then_updates() {
        let server = TestServer::new().await;
        vote(&server, "CSC/20/01/0001", server.alice.id).await;

        let stream = server.client.get(uri!(tally_stream)).dispatch().await;
        assert_eq!(stream.status(), Status::Ok);

        vote(&server, "CSC/20/01/0002", server.bob.id).await;
        // Closing the election ends the stream.
        server
            .registry
            .set_status(server.election.id, ElectionStatus::Closed);
        let response = server
            .client
            .post(uri!(active_election_changed))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let body = stream.into_string().await.unwrap();
        let init = body.find(INIT_EVENT).unwrap();
        let update = body.find(UPDATE_EVENT).unwrap();
        assert!(init < update);
        assert_eq!(body.matches(UPDATE_EVENT).count(), 1);
        assert!(body.contains(&format!(r#""candidateId":"{}""#, server.bob.id)));
        assert!(body.contains(r#""delta":1"#));
    }

    #[rocket::async_test]
    async fn hook_follows_the_active_election() {
        let server = TestServer::new().await;

        let next = Election::current_example();
        let secretary = Position::example(&next, "Secretary");
        server
            .registry
            .set_status(server.election.id, ElectionStatus::Closed);
        server.registry.add_election(next.clone());
        server.registry.add_position(secretary.clone());

        let response = server
            .client
            .post(uri!(active_election_changed))
            .dispatch()
            .await;
        let body = response.into_json::<ActiveElectionChanged>().await.unwrap();
        assert_eq!(body.election_id, Some(next.id.to_string()));

        let snapshot = server
            .client
            .get(uri!(tally))
            .dispatch()
            .await
            .into_json::<TallySnapshot>()
            .await
            .unwrap();
        assert_eq!(snapshot.election_id, next.id);
        assert!(snapshot.snapshot.position(secretary.id).is_some());
        assert!(snapshot.snapshot.position(server.president.id).is_none());
    }

    #[rocket::async_test]
    async fn nothing_to_follow() {
        let server = TestServer::new().await;
        server
            .registry
            .set_status(server.election.id, ElectionStatus::Closed);

        let response = server
            .client
            .post(uri!(active_election_changed))
            .dispatch()
            .await;
        let body = response.into_json::<ActiveElectionChanged>().await.unwrap();
        assert_eq!(body.election_id, None);

        let response = server.client.get(uri!(tally)).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
        let response = server.client.get(uri!(tally_stream)).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }
}
