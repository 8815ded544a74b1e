use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{self, doc, serde_helpers::chrono_datetime_as_bson_datetime, Bson};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::DocumentSubmission,
    common::{DocumentKind, DocumentStatus},
    db::User,
    mongodb::Id,
};

/// Core document data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCore {
    pub title: String,
    pub kind: DocumentKind,
    /// Where the actual file lives.
    pub url: String,
    pub status: DocumentStatus,
    pub submitter_id: Id,
    pub submitter_name: String,
    /// Explanation given by the reviewer, if any.
    pub reason: Option<String>,
    pub reviewer_id: Option<Id>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl DocumentCore {
    /// A freshly submitted, pending document.
    pub fn new(submission: DocumentSubmission, submitter: &User, now: DateTime<Utc>) -> Self {
        Self {
            title: submission.title,
            kind: submission.kind,
            url: submission.url,
            status: DocumentStatus::Pending,
            submitter_id: submitter.id,
            submitter_name: submitter.display_name.clone(),
            reason: None,
            reviewer_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a change in place. The caller is responsible for having checked
    /// that the current status is `change.required_status()`.
    pub fn apply(&mut self, change: &DocumentChange, now: DateTime<Utc>) {
        match change {
            DocumentChange::Review {
                status,
                reason,
                reviewer_id,
            } => {
                self.status = *status;
                self.reason = reason.clone();
                self.reviewer_id = Some(*reviewer_id);
            }
            DocumentChange::Resubmit(submission) => {
                self.title = submission.title.clone();
                self.kind = submission.kind;
                self.url = submission.url.clone();
                self.status = DocumentStatus::Pending;
                self.reason = None;
                self.reviewer_id = None;
            }
        }
        self.updated_at = now;
    }
}

/// A document without an ID.
pub type NewDocument = DocumentCore;

/// A document from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub document: DocumentCore,
}

impl Deref for Document {
    type Target = DocumentCore;

    fn deref(&self) -> &Self::Target {
        &self.document
    }
}

impl DerefMut for Document {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.document
    }
}

/// A status transition of an existing document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentChange {
    /// An officer's decision on a pending document.
    Review {
        status: DocumentStatus,
        reason: Option<String>,
        reviewer_id: Id,
    },
    /// The submitter's corrected version of a document sent back for revision.
    Resubmit(DocumentSubmission),
}

impl DocumentChange {
    /// The status the document must currently have for this change to apply.
    pub fn required_status(&self) -> DocumentStatus {
        match self {
            Self::Review { .. } => DocumentStatus::Pending,
            Self::Resubmit(_) => DocumentStatus::Revision,
        }
    }

    /// The status the document has afterwards.
    pub fn target_status(&self) -> DocumentStatus {
        match self {
            Self::Review { status, .. } => *status,
            Self::Resubmit(_) => DocumentStatus::Pending,
        }
    }

    /// Refuse a change the lifecycle does not allow, before anything is written.
    pub fn check_transition(&self) -> Result<()> {
        let (from, to) = (self.required_status(), self.target_status());
        if !from.can_become(to) {
            return Err(Error::bad_request(format!(
                "A {from:?} document cannot become {to:?}"
            )));
        }
        Ok(())
    }

    /// The equivalent MongoDB update document, mirroring [`DocumentCore::apply`].
    pub fn to_update(&self, now: DateTime<Utc>) -> bson::Document {
        let updated_at = Bson::DateTime(now.into());
        match self {
            Self::Review {
                status,
                reason,
                reviewer_id,
            } => doc! {
                "$set": {
                    "status": *status,
                    "reason": reason.clone(),
                    "reviewer_id": *reviewer_id,
                    "updated_at": updated_at,
                }
            },
            Self::Resubmit(submission) => doc! {
                "$set": {
                    "title": submission.title.clone(),
                    "kind": submission.kind,
                    "url": submission.url.clone(),
                    "status": DocumentStatus::Pending,
                    "reason": Bson::Null,
                    "reviewer_id": Bson::Null,
                    "updated_at": updated_at,
                }
            },
        }
    }
}
