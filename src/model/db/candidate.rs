use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{common::ElectionId, mongodb::Id};

/// Core candidate data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    /// Foreign key election ID.
    pub election_id: ElectionId,
    pub name: String,
    /// Display order on the ballot, unique within the election.
    pub ballot_number: u32,
    pub vision: String,
    pub mission: String,
    pub photo_url: Option<String>,
    /// Denormalised tally, only ever changed together with a vote record.
    pub vote_count: u64,
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl NewCandidate {
        pub fn example(election_id: &str, ballot_number: u32) -> Self {
            Self {
                election_id: election_id.to_string(),
                name: format!("Candidate {ballot_number}"),
                ballot_number,
                vision: "A livelier campus".to_string(),
                mission: "Weekly open forums".to_string(),
                photo_url: None,
                vote_count: 0,
            }
        }
    }
}
