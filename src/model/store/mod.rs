//! Persistence seam between the routes and the databases.
//!
//! [`Store`] is implemented by the remote MongoDB store, by the in-memory
//! [`MemoryStore`] that holds the local tables, and by [`MirroredStore`], which
//! reads through the former into the latter. Routes only ever see a [`Repo`].

use std::{ops::Deref, sync::Arc};

use log::info;
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::error::{Error, Result};
use crate::model::{
    api::{NewAccount, PaginationRequest},
    db::{
        Candidate, Document, DocumentChange, NewCandidate, NewDocument, NewUser, User, VoteRecord,
    },
    mongodb::Id,
};

mod memory;
mod mirror;

pub use memory::MemoryStore;
pub use mirror::MirroredStore;

/// Which documents a listing selects, and in which order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentQuery {
    /// Pending documents, oldest first.
    Inbox,
    /// Reviewed documents, most recently updated first.
    History,
    /// Everything one user submitted, newest first.
    SubmittedBy(Id),
}

impl DocumentQuery {
    pub fn matches(&self, document: &Document) -> bool {
        use crate::model::common::DocumentStatus::Pending;
        match self {
            Self::Inbox => document.status == Pending,
            Self::History => document.status != Pending,
            Self::SubmittedBy(user) => document.submitter_id == *user,
        }
    }

    /// Sort documents into this query's order. IDs break ties so the order is stable.
    pub fn sort(&self, documents: &mut [Document]) {
        match self {
            Self::Inbox => documents.sort_by_key(|d| (d.created_at, d.id)),
            Self::History => {
                documents.sort_by(|a, b| (b.updated_at, b.id).cmp(&(a.updated_at, a.id)))
            }
            Self::SubmittedBy(_) => {
                documents.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)))
            }
        }
    }
}

/// Everything the workflows need from a database.
#[rocket::async_trait]
pub trait Store: Send + Sync {
    async fn user_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn user(&self, id: Id) -> Result<Option<User>>;

    async fn count_officers(&self) -> Result<u64>;

    /// Insert a new user. Usernames are unique.
    async fn insert_user(&self, user: NewUser) -> Result<User>;

    /// All candidates of an election, in ballot order.
    async fn candidates(&self, election_id: &str) -> Result<Vec<Candidate>>;

    /// Insert a new candidate. Ballot numbers are unique within an election.
    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate>;

    async fn vote_record(&self, election_id: &str, voter_id: Id) -> Result<Option<VoteRecord>>;

    /// Record `voter_id`'s vote for `candidate_id` and increment the
    /// candidate's counter, as a single atomic unit. Fails without any change
    /// if the voter has already voted in the election or the candidate does
    /// not stand in it.
    async fn cast_vote(
        &self,
        election_id: &str,
        candidate_id: Id,
        voter_id: Id,
    ) -> Result<(Candidate, VoteRecord)>;

    async fn insert_document(&self, document: NewDocument) -> Result<Document>;

    async fn document(&self, id: Id) -> Result<Option<Document>>;

    /// Documents selected by `query`, in its order, optionally limited to one page.
    async fn documents(
        &self,
        query: DocumentQuery,
        page: Option<PaginationRequest>,
    ) -> Result<Vec<Document>>;

    async fn count_documents(&self, query: DocumentQuery) -> Result<u64>;

    /// Apply `change` only if the document is still in `change.required_status()`.
    /// A document that has moved on in the meantime yields a conflict.
    async fn change_document(&self, id: Id, change: &DocumentChange) -> Result<Document>;
}

pub(crate) fn already_voted(election_id: &str) -> Error {
    Error::conflict(format!("Already voted in election '{election_id}'"))
}

pub(crate) fn candidate_not_found(election_id: &str, candidate_id: Id) -> Error {
    Error::not_found(format!(
        "Candidate '{candidate_id}' in election '{election_id}'"
    ))
}

pub(crate) fn duplicate_username(username: &str) -> Error {
    Error::conflict(format!("Username already in use: {username}"))
}

pub(crate) fn duplicate_ballot_number(election_id: &str, ballot_number: u32) -> Error {
    Error::bad_request(format!(
        "Ballot number {ballot_number} is already taken in election '{election_id}'"
    ))
}

/// The error for a conditional document change that found the document in
/// the wrong state (or not at all).
pub(crate) fn change_refused(id: Id, current: Option<&Document>, change: &DocumentChange) -> Error {
    match current {
        None => Error::not_found(format!("Document '{id}'")),
        Some(document) => Error::conflict(format!(
            "Document '{id}' is {:?}, it must be {:?} to become {:?}",
            document.status,
            change.required_status(),
            change.target_status()
        )),
    }
}

/// Make sure somebody can sign in to manage the organisation, creating the
/// bootstrap officer if there is no officer yet.
///
/// This operation is idempotent.
pub async fn ensure_officer_exists(
    store: &dyn Store,
    bootstrap: Option<NewAccount>,
) -> Result<()> {
    if store.count_officers().await? > 0 {
        return Ok(());
    }
    let mut account = bootstrap.ok_or_else(|| {
        Error::Unavailable("No officer exists and no `bootstrap_officer` is configured".to_string())
    })?;
    account.rights = crate::model::common::Rights::Officer;
    let officer = store.insert_user(account.try_into()?).await?;
    info!("Created bootstrap officer '{}'", officer.username);
    Ok(())
}

/// Handle on the application's store, as held in managed state.
#[derive(Clone)]
pub struct Repo(Arc<MirroredStore>);

impl Repo {
    /// Mirror `remote` into `local`.
    pub fn new(remote: Arc<dyn Store>, local: MemoryStore) -> Self {
        Self(Arc::new(MirroredStore::new(remote, local)))
    }
}

impl Deref for Repo {
    type Target = MirroredStore;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Repo {
    type Error = ();

    /// Get the store from the managed state.
    ///
    /// Panics iff the [`Repo`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let repo = req.guard::<&State<Repo>>().await.unwrap();
        request::Outcome::Success(repo.inner().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rocket::async_test]
    async fn bootstrap_officer_is_created_once() {
        let store = MemoryStore::new();
        ensure_officer_exists(&store, Some(NewAccount::example_officer()))
            .await
            .unwrap();
        ensure_officer_exists(&store, Some(NewAccount::example_officer()))
            .await
            .unwrap();
        assert_eq!(store.count_officers().await.unwrap(), 1);
    }

    #[rocket::async_test]
    async fn bootstrap_account_is_promoted() {
        let store = MemoryStore::new();
        ensure_officer_exists(&store, Some(NewAccount::example_member()))
            .await
            .unwrap();
        let user = store
            .user_by_username(&NewAccount::example_member().username)
            .await
            .unwrap()
            .unwrap();
        assert!(user.is_officer());
    }

    #[rocket::async_test]
    async fn missing_bootstrap_is_an_error() {
        let store = MemoryStore::new();
        assert!(ensure_officer_exists(&store, None).await.is_err());
    }
}
