use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::ElectionId, mongodb::Id};

/// Whether, and for whom, one user voted in one election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecordCore {
    pub election_id: ElectionId,
    pub voter_id: Id,
    /// `None` until the voter has actually cast their vote.
    pub candidate_id: Option<Id>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}

impl VoteRecordCore {
    /// The one and only "has voted" gate.
    pub fn has_voted(&self) -> bool {
        self.candidate_id.is_some()
    }
}

/// A vote record from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub record: VoteRecordCore,
}

impl Deref for VoteRecord {
    type Target = VoteRecordCore;

    fn deref(&self) -> &Self::Target {
        &self.record
    }
}

impl DerefMut for VoteRecord {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.record
    }
}
