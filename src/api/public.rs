use rocket::{serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::api::ballot_paper::{BallotPaper, ElectionSummary};
use crate::Backends;

pub fn routes() -> Vec<Route> {
    routes![positions_with_candidates, active_election]
}

#[get("/positions-with-candidates")]
async fn positions_with_candidates(backends: &State<Backends>) -> Result<Json<BallotPaper>> {
    let paper = backends
        .registry
        .ballot_paper()
        .await?
        .ok_or_else(|| Error::not_found("Active election"))?;
    Ok(Json(paper))
}

#[get("/active-election")]
async fn active_election(backends: &State<Backends>) -> Result<Json<ElectionSummary>> {
    let election = backends
        .registry
        .active_election()
        .await?
        .ok_or_else(|| Error::not_found("Active election"))?;
    Ok(Json(election.into()))
}

#[cfg(test)]
mod tests {
    use rocket::http::Status;

    use super::*;
    use crate::api::test_server::TestServer;
    use crate::model::{
        common::election::ElectionStatus,
        db::election::{Candidate, Election, Position},
    };

    #[rocket::async_test]
    async fn ballot_paper_lists_positions_and_candidates() {
        let server = TestServer::new().await;
        let secretary = Position::example(&server.election, "Secretary");
        let carol = Candidate::example(&secretary, "Carol");
        server.registry.add_position(secretary.clone());
        server.registry.add_candidate(carol.clone());
        // Positions of other elections stay off the paper.
        let upcoming = Election::upcoming_example();
        server.registry.add_election(upcoming.clone());
        server
            .registry
            .add_position(Position::example(&upcoming, "Treasurer"));

        let response = server
            .client
            .get(uri!(positions_with_candidates))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let paper = response.into_json::<BallotPaper>().await.unwrap();

        assert_eq!(paper.election.id, server.election.id);
        assert_eq!(paper.election.status, ElectionStatus::Active);
        let names = paper
            .positions
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["President", "Secretary"]);
        let candidates = paper.positions[0]
            .candidates
            .iter()
            .map(|c| c.id)
            .collect::<Vec<_>>();
        assert_eq!(candidates, vec![server.alice.id, server.bob.id]);
        assert_eq!(paper.positions[1].candidates[0].name, "Carol");
    }

    #[rocket::async_test]
    async fn active_election_summary() {
        let server = TestServer::new().await;

        let response = server.client.get(uri!(active_election)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let summary = response.into_json::<ElectionSummary>().await.unwrap();
        assert_eq!(summary.id, server.election.id);
        assert_eq!(summary.title, server.election.title);
    }

    #[rocket::async_test]
    async fn nothing_active() {
        let server = TestServer::new().await;
        server
            .registry
            .set_status(server.election.id, ElectionStatus::Closed);

        for uri in [uri!(active_election), uri!(positions_with_candidates)] {
            let response = server.client.get(uri).dispatch().await;
            assert_eq!(response.status(), Status::NotFound);
        }
    }
}
