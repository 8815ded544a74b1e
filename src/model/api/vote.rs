use chrono::{serde::ts_seconds_option, DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{common::ElectionId, db::VoteRecord};

/// The candidate a user wishes to vote for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub candidate_id: String,
}

/// Whether the calling user has voted in an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteStatus {
    pub election_id: ElectionId,
    pub has_voted: bool,
    pub candidate_id: Option<String>,
    #[serde(with = "ts_seconds_option")]
    pub cast_at: Option<DateTime<Utc>>,
}

impl VoteStatus {
    pub fn from_record(election_id: &str, record: Option<VoteRecord>) -> Self {
        match record.filter(|r| r.has_voted()) {
            Some(record) => Self {
                election_id: election_id.to_string(),
                has_voted: true,
                candidate_id: record.candidate_id.map(|id| id.to_string()),
                cast_at: Some(record.cast_at),
            },
            None => Self {
                election_id: election_id.to_string(),
                has_voted: false,
                candidate_id: None,
                cast_at: None,
            },
        }
    }
}
