use rocket::{http::Status, serde::json::Json, Catcher, Request, Route};
use serde::Serialize;

mod public;
mod tally;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(voting::routes());
    routes.extend(public::routes());
    routes.extend(tally::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// Body of every error response not produced by a route itself.
#[derive(Debug, Serialize)]
struct ErrorBody {
    status: u16,
    reason: &'static str,
}

#[catch(default)]
fn default_catcher(status: Status, _req: &Request) -> (Status, Json<ErrorBody>) {
    let body = ErrorBody {
        status: status.code,
        reason: status.reason().unwrap_or("Unknown"),
    };
    (status, Json(body))
}
