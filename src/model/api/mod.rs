//! API-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Field names are camelCase.

pub mod admission;
pub mod ballot_paper;
pub mod connection;
pub mod submission;
pub mod tally;
