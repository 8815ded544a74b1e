use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::{optional, required},
    common::ElectionId,
    db::{Candidate, NewCandidate},
};

/// A candidate as submitted by an officer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    pub ballot_number: u32,
    #[serde(default)]
    pub vision: String,
    #[serde(default)]
    pub mission: String,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl CandidateSpec {
    /// Validate the spec and turn it into a candidate of the given election
    /// with no votes yet.
    pub fn into_candidate(self, election_id: &str) -> Result<NewCandidate> {
        let name = required(self.name, "name")?;
        if self.ballot_number == 0 {
            return Err(Error::bad_request("Ballot numbers start at 1"));
        }
        Ok(NewCandidate {
            election_id: election_id.to_string(),
            name,
            ballot_number: self.ballot_number,
            vision: self.vision.trim().to_string(),
            mission: self.mission.trim().to_string(),
            photo_url: optional(self.photo_url),
            vote_count: 0,
        })
    }
}

/// API-friendly representation of a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: String,
    pub election_id: ElectionId,
    pub name: String,
    pub ballot_number: u32,
    pub vision: String,
    pub mission: String,
    pub photo_url: Option<String>,
    pub vote_count: u64,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        let id = candidate.id.to_string();
        let c = candidate.candidate;
        Self {
            id,
            election_id: c.election_id,
            name: c.name,
            ballot_number: c.ballot_number,
            vision: c.vision,
            mission: c.mission,
            photo_url: c.photo_url,
            vote_count: c.vote_count,
        }
    }
}

/// The tally of an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub election_id: ElectionId,
    pub total_votes: u64,
    /// In ballot order.
    pub candidates: Vec<CandidateDescription>,
    /// Every candidate sharing the highest count. Empty until someone votes;
    /// more than one entry means a tie, which is reported rather than broken.
    pub leaders: Vec<String>,
}

impl ElectionResults {
    /// Tally the given candidates, which must already be in ballot order.
    pub fn tally(election_id: &str, candidates: Vec<Candidate>) -> Self {
        let total_votes: u64 = candidates.iter().map(|c| c.vote_count).sum();
        let top = candidates.iter().map(|c| c.vote_count).max().unwrap_or(0);
        let leaders = if top == 0 {
            Vec::new()
        } else {
            candidates
                .iter()
                .filter(|c| c.vote_count == top)
                .map(|c| c.id.to_string())
                .collect()
        };
        Self {
            election_id: election_id.to_string(),
            total_votes,
            candidates: candidates.into_iter().map(Into::into).collect(),
            leaders,
        }
    }
}
