use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// What sort of paperwork a document is.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Proposal,
    FinancialReport,
}

/// States in the document approval lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentStatus {
    /// Submitted and waiting in the officers' inbox.
    Pending,
    /// Accepted. Terminal.
    Approved,
    /// Sent back to the submitter for changes; may be resubmitted.
    Revision,
    /// Refused. Terminal.
    Rejected,
}

impl DocumentStatus {
    /// Is this one of the outcomes an officer can give a pending document?
    pub fn is_review_outcome(self) -> bool {
        matches!(self, Self::Approved | Self::Revision | Self::Rejected)
    }

    /// Is the transition `self -> next` permitted?
    pub fn can_become(self, next: DocumentStatus) -> bool {
        match self {
            Self::Pending => next.is_review_outcome(),
            Self::Revision => next == Self::Pending,
            Self::Approved | Self::Rejected => false,
        }
    }
}

impl From<DocumentStatus> for Bson {
    fn from(status: DocumentStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

impl From<DocumentKind> for Bson {
    fn from(kind: DocumentKind) -> Self {
        to_bson(&kind).expect("Serialisation is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::DocumentStatus::*;

    #[test]
    fn pending_moves_only_to_review_outcomes() {
        assert!(Pending.can_become(Approved));
        assert!(Pending.can_become(Rejected));
        assert!(Pending.can_become(Revision));
        assert!(!Pending.can_become(Pending));
    }

    #[test]
    fn approved_and_rejected_are_terminal() {
        for next in [Pending, Approved, Revision, Rejected] {
            assert!(!Approved.can_become(next));
            assert!(!Rejected.can_become(next));
        }
    }

    #[test]
    fn revision_can_only_be_resubmitted() {
        assert!(Revision.can_become(Pending));
        assert!(!Revision.can_become(Approved));
        assert!(!Revision.can_become(Rejected));
    }
}
