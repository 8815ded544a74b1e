//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Datetimes are serialised as timestamps.

mod account;
mod candidate;
mod document;
mod pagination;
mod vote;

pub use account::{Credentials, NewAccount, UserDescription, MIN_PASSWORD_LENGTH};
pub use candidate::{CandidateDescription, CandidateSpec, ElectionResults};
pub use document::{DocumentDescription, DocumentSubmission, StatusUpdate};
pub use pagination::{Paginated, PaginationRequest, PaginationResult};
pub use vote::{VoteRequest, VoteStatus};

use crate::error::{Error, Result};
use crate::model::mongodb::Id;

/// Parse a hex ID received in a request body.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Id> {
    raw.trim()
        .parse()
        .map_err(|_| Error::bad_request(format!("Malformed {what} ID '{raw}'")))
}

/// Trim a required free-text field, rejecting it if nothing is left.
pub(crate) fn required(value: String, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::bad_request(format!("`{field}` must not be blank")));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional free-text field, treating a blank value as absent.
pub(crate) fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
