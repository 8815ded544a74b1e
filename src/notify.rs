use aws_sdk_sns::Client as SnsClient;
use log::{debug, warn};

use crate::model::db::{Candidate, Document};

/// Something officers or members should hear about.
#[derive(Debug, Clone, Copy)]
pub enum Notification<'a> {
    DocumentSubmitted(&'a Document),
    DocumentReviewed(&'a Document),
    DocumentResubmitted(&'a Document),
    CandidateAdded(&'a Candidate),
}

impl Notification<'_> {
    pub fn subject(&self) -> String {
        match self {
            Self::DocumentSubmitted(d) => format!("New document: {}", d.title),
            Self::DocumentReviewed(d) => format!("Document {:?}: {}", d.status, d.title),
            Self::DocumentResubmitted(d) => format!("Document resubmitted: {}", d.title),
            Self::CandidateAdded(c) => format!("New candidate in {}", c.election_id),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::DocumentSubmitted(d) | Self::DocumentResubmitted(d) => format!(
                "{} submitted \"{}\" ({:?}) for review.",
                d.submitter_name, d.title, d.kind
            ),
            Self::DocumentReviewed(d) => match d.reason {
                Some(ref reason) => format!(
                    "\"{}\" by {} is now {:?}. Reason: {reason}",
                    d.title, d.submitter_name, d.status
                ),
                None => format!(
                    "\"{}\" by {} is now {:?}.",
                    d.title, d.submitter_name, d.status
                ),
            },
            Self::CandidateAdded(c) => format!(
                "{} is standing in election {} as candidate number {}.",
                c.name, c.election_id, c.ballot_number
            ),
        }
    }
}

/// Publishes notifications to an Amazon SNS topic.
///
/// Delivery is best-effort: a failure is logged and otherwise ignored.
#[derive(Clone)]
pub struct Notifier {
    target: Option<SnsTarget>,
}

#[derive(Clone)]
struct SnsTarget {
    client: SnsClient,
    topic_arn: String,
}

impl Notifier {
    /// A notifier that drops everything.
    pub fn disabled() -> Self {
        Self { target: None }
    }

    pub fn sns(client: SnsClient, topic_arn: String) -> Self {
        Self {
            target: Some(SnsTarget { client, topic_arn }),
        }
    }

    pub async fn send(&self, notification: Notification<'_>) {
        let subject = notification.subject();
        let Some(ref target) = self.target else {
            debug!("Notifications disabled, dropping \"{subject}\"");
            return;
        };

        let result = target
            .client
            .publish()
            .topic_arn(&target.topic_arn)
            .subject(&subject)
            .message(notification.message())
            .send()
            .await;
        match result {
            Ok(_) => debug!("Published notification \"{subject}\""),
            Err(e) => warn!("Failed to publish notification \"{subject}\": {e}"),
        }
    }
}
