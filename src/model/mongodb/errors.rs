//! For some reason, the mongodb crate doesn't provide error code constants.
//! This module fills in the gaps.

use mongodb::error::{Error as DbError, ErrorKind, WriteFailure};

pub const DUPLICATE_KEY: i32 = 11000;

/// If the given error is a duplicate key write error, return the server's
/// message, which names the violated index.
pub fn duplicate_key_message(err: &DbError) -> Option<&str> {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref e)) if e.code == DUPLICATE_KEY => {
            Some(&e.message)
        }
        _ => None,
    }
}

