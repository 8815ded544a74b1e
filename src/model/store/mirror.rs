use std::sync::Arc;

use log::warn;

use crate::error::{Error, Result};
use crate::model::{
    api::PaginationRequest,
    db::{
        Candidate, Document, DocumentChange, NewCandidate, NewDocument, NewUser, User, VoteRecord,
    },
    mongodb::Id,
};

use super::{DocumentQuery, MemoryStore, Store};

/// Read-through mirror of a remote store into local tables.
///
/// Reads go to the remote store and whatever comes back is upserted locally.
/// When the remote store cannot be reached, reads are answered from the local
/// tables instead. Writes always go to the remote store first and are only
/// mirrored once they succeed.
pub struct MirroredStore {
    remote: Arc<dyn Store>,
    local: MemoryStore,
}

impl MirroredStore {
    pub fn new(remote: Arc<dyn Store>, local: MemoryStore) -> Self {
        Self { remote, local }
    }

    /// The local tables.
    pub fn local(&self) -> &MemoryStore {
        &self.local
    }

    /// Serve a failed read from the local tables, if the failure was the
    /// remote store's.
    fn fall_back<T>(&self, what: &str, err: Error, read: impl FnOnce(&MemoryStore) -> T) -> Result<T> {
        if !err.is_store_failure() {
            return Err(err);
        }
        warn!("Remote store failed reading {what}, serving cached copy: {err}");
        Ok(read(&self.local))
    }
}

/// A write that could not reach the remote store is reported as
/// unavailability. Anything else the store said stands.
fn write_failed(err: Error) -> Error {
    if !err.is_store_failure() {
        return err;
    }
    match err {
        Error::Db(e) => Error::Unavailable(e.to_string()),
        other => other,
    }
}

#[rocket::async_trait]
impl Store for MirroredStore {
    async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        match self.remote.user_by_username(username).await {
            Ok(user) => {
                if let Some(ref user) = user {
                    self.local.upsert_user(user);
                }
                Ok(user)
            }
            Err(e) => self.fall_back("user", e, |local| local.find_user_by_username(username)),
        }
    }

    async fn user(&self, id: Id) -> Result<Option<User>> {
        match self.remote.user(id).await {
            Ok(user) => {
                if let Some(ref user) = user {
                    self.local.upsert_user(user);
                }
                Ok(user)
            }
            Err(e) => self.fall_back("user", e, |local| local.find_user(id)),
        }
    }

    async fn count_officers(&self) -> Result<u64> {
        match self.remote.count_officers().await {
            Ok(count) => Ok(count),
            Err(e) => self.fall_back("officer count", e, MemoryStore::officer_count),
        }
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let user = self.remote.insert_user(user).await.map_err(write_failed)?;
        self.local.upsert_user(&user);
        Ok(user)
    }

    async fn candidates(&self, election_id: &str) -> Result<Vec<Candidate>> {
        match self.remote.candidates(election_id).await {
            Ok(candidates) => {
                self.local.upsert_candidates(&candidates);
                Ok(candidates)
            }
            Err(e) => self.fall_back("candidates", e, |local| local.find_candidates(election_id)),
        }
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate> {
        let candidate = self
            .remote
            .insert_candidate(candidate)
            .await
            .map_err(write_failed)?;
        self.local.upsert_candidates(std::slice::from_ref(&candidate));
        Ok(candidate)
    }

    async fn vote_record(&self, election_id: &str, voter_id: Id) -> Result<Option<VoteRecord>> {
        match self.remote.vote_record(election_id, voter_id).await {
            Ok(record) => {
                if let Some(ref record) = record {
                    self.local.upsert_vote_record(record);
                }
                Ok(record)
            }
            Err(e) => self.fall_back("vote record", e, |local| {
                local.find_vote_record(election_id, voter_id)
            }),
        }
    }

    async fn cast_vote(
        &self,
        election_id: &str,
        candidate_id: Id,
        voter_id: Id,
    ) -> Result<(Candidate, VoteRecord)> {
        let (candidate, record) = self
            .remote
            .cast_vote(election_id, candidate_id, voter_id)
            .await
            .map_err(write_failed)?;
        self.local.upsert_candidates(std::slice::from_ref(&candidate));
        self.local.upsert_vote_record(&record);
        Ok((candidate, record))
    }

    async fn insert_document(&self, document: NewDocument) -> Result<Document> {
        let document = self
            .remote
            .insert_document(document)
            .await
            .map_err(write_failed)?;
        self.local.upsert_documents(std::slice::from_ref(&document));
        Ok(document)
    }

    async fn document(&self, id: Id) -> Result<Option<Document>> {
        match self.remote.document(id).await {
            Ok(document) => {
                if let Some(ref document) = document {
                    self.local.upsert_documents(std::slice::from_ref(document));
                }
                Ok(document)
            }
            Err(e) => self.fall_back("document", e, |local| local.find_document(id)),
        }
    }

    async fn documents(
        &self,
        query: DocumentQuery,
        page: Option<PaginationRequest>,
    ) -> Result<Vec<Document>> {
        match self.remote.documents(query, page).await {
            Ok(documents) => {
                self.local.upsert_documents(&documents);
                Ok(documents)
            }
            Err(e) => self.fall_back("documents", e, |local| local.find_documents(query, page)),
        }
    }

    async fn count_documents(&self, query: DocumentQuery) -> Result<u64> {
        match self.remote.count_documents(query).await {
            Ok(count) => Ok(count),
            Err(e) => self.fall_back("document count", e, |local| local.document_count(query)),
        }
    }

    async fn change_document(&self, id: Id, change: &DocumentChange) -> Result<Document> {
        let document = self
            .remote
            .change_document(id, change)
            .await
            .map_err(write_failed)?;
        self.local.upsert_documents(std::slice::from_ref(&document));
        Ok(document)
    }
}
