//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.
//! - Each stored type `X` has an `XCore` holding everything but the ID, aliased
//!   as `NewX` for inserts.

pub mod candidate;
pub mod document;
pub mod user;
pub mod vote_record;

pub use candidate::{Candidate, NewCandidate};
pub use document::{Document, DocumentChange, NewDocument};
pub use user::{NewUser, User};
pub use vote_record::VoteRecord;
