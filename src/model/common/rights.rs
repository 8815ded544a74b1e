use std::fmt::Display;

use mongodb::bson::{to_bson, Bson};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// What a user is allowed to do. Rights are ordered: every right a member
/// holds, an officer holds too.
#[derive(
    Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum Rights {
    /// Ordinary member: votes and submits documents.
    Member = 0,
    /// Organisation officer: additionally manages candidates, accounts and reviews documents.
    Officer = 1,
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Member => "member",
                Self::Officer => "officer",
            }
        )
    }
}

impl From<Rights> for Bson {
    fn from(rights: Rights) -> Self {
        to_bson(&rights).expect("Serialisation is infallible")
    }
}
