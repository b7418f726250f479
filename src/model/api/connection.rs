use std::convert::Infallible;

use rocket::{
    request::{FromRequest, Outcome},
    Request,
};

use crate::logging::RequestId;

/// Where a request came from, recorded with ballots and abuse records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionMeta {
    pub request_id: RequestId,
    pub origin_address: String,
    pub user_agent: Option<String>,
}

impl ConnectionMeta {
    /// A local caller, for tests.
    #[cfg(test)]
    pub fn example() -> Self {
        Self {
            request_id: RequestId(0),
            origin_address: "127.0.0.1".to_string(),
            user_agent: Some("test-agent".to_string()),
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ConnectionMeta {
    type Error = Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let request_id = *req.local_cache(RequestId::next);
        let origin_address = req
            .client_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let user_agent = req.headers().get_one("User-Agent").map(str::to_string);
        Outcome::Success(Self {
            request_id,
            origin_address,
            user_agent,
        })
    }
}
