mod bson;
mod collection;
mod errors;

pub use bson::{serde_hex, serde_string_map, Id};
pub use collection::{
    ensure_indexes_exist, Coll, MongoCollection, UNIQUE_BIOMETRIC_INDEX, UNIQUE_VOTE_INDEX,
};
pub use errors::duplicate_key_message;
