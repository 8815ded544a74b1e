use chrono::{serde::ts_seconds, DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::{optional, required},
    common::{DocumentKind, DocumentStatus},
    db::Document,
};

/// A document as submitted (or resubmitted) by a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSubmission {
    pub title: String,
    pub kind: DocumentKind,
    pub url: String,
}

impl DocumentSubmission {
    /// Trim the free-text fields, refusing a blank title or URL.
    pub fn validated(self) -> Result<Self> {
        Ok(Self {
            title: required(self.title, "title")?,
            kind: self.kind,
            url: required(self.url, "url")?,
        })
    }
}

/// An officer's decision on a pending document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: DocumentStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

impl StatusUpdate {
    /// Check the target status is a review outcome and normalise the reason.
    pub fn validated(self) -> Result<Self> {
        if !self.status.is_review_outcome() {
            return Err(Error::bad_request(format!(
                "A document cannot be reviewed as {:?}",
                self.status
            )));
        }
        Ok(Self {
            status: self.status,
            reason: optional(self.reason),
        })
    }
}

/// API-friendly representation of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDescription {
    pub id: String,
    pub title: String,
    pub kind: DocumentKind,
    pub url: String,
    pub status: DocumentStatus,
    pub submitter_id: String,
    pub submitter_name: String,
    pub reason: Option<String>,
    pub reviewer_id: Option<String>,
    #[serde(with = "ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl From<Document> for DocumentDescription {
    fn from(document: Document) -> Self {
        let id = document.id.to_string();
        let d = document.document;
        Self {
            id,
            title: d.title,
            kind: d.kind,
            url: d.url,
            status: d.status,
            submitter_id: d.submitter_id.to_string(),
            submitter_name: d.submitter_name,
            reason: d.reason,
            reviewer_id: d.reviewer_id.map(|id| id.to_string()),
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}
