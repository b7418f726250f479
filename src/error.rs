use std::fmt::Display;

use log::{error, warn};
use mongodb::error::Error as DbError;
use rocket::{http::Status, response::Responder};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The storage layer failed; nothing was recorded and the request may be retried.
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    pub fn not_found(what: impl Display) -> Self {
        Self::Status(Status::NotFound, format!("Not found: {what}"))
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        Err(match self {
            Self::Db(err) => {
                error!("Storage unavailable: {err}");
                Status::ServiceUnavailable
            }
            Self::Status(status, msg) => {
                warn!("{msg}");
                status
            }
        })
    }
}
