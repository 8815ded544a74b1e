use std::{
    fs,
    io::ErrorKind,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use rocket::serde::json::serde_json;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::PaginationRequest,
    common::{now, Rights},
    db::{
        vote_record::VoteRecordCore, Candidate, Document, DocumentChange, NewCandidate,
        NewDocument, NewUser, User, VoteRecord,
    },
    mongodb::Id,
};

use super::{
    already_voted, candidate_not_found, change_refused, duplicate_ballot_number,
    duplicate_username, DocumentQuery, Store,
};

/// The local tables: one per mirrored remote collection.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    users: Vec<User>,
    candidates: Vec<Candidate>,
    vote_records: Vec<VoteRecord>,
    documents: Vec<Document>,
}

/// Replace the entry with the same ID, or append it. Last write wins.
fn upsert_by<T: Clone>(table: &mut Vec<T>, item: &T, same: impl Fn(&T) -> bool) {
    match table.iter_mut().find(|existing| same(existing)) {
        Some(existing) => *existing = item.clone(),
        None => table.push(item.clone()),
    }
}

/// An in-process store. Serves as the local cache tables behind
/// [`super::MirroredStore`], and as a complete [`Store`] in its own right.
///
/// Cloning gives another handle on the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    /// Simulates a lost connection to this store.
    #[cfg(test)]
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load tables from a snapshot file. A missing file gives empty tables.
    pub fn load_snapshot(path: &Path) -> Result<Self> {
        let tables = match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Tables::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            tables: Arc::new(Mutex::new(tables)),
            ..Self::default()
        })
    }

    /// Write all tables to a snapshot file.
    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec(&*self.lock())?;
        fs::write(path, bytes)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    #[cfg(test)]
    fn online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn online(&self) -> Result<()> {
        Ok(())
    }

    // Local reads.

    pub fn find_user_by_username(&self, username: &str) -> Option<User> {
        self.lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned()
    }

    pub fn find_user(&self, id: Id) -> Option<User> {
        self.lock().users.iter().find(|u| u.id == id).cloned()
    }

    pub fn officer_count(&self) -> u64 {
        self.lock()
            .users
            .iter()
            .filter(|u| u.rights >= Rights::Officer)
            .count() as u64
    }

    pub fn find_candidates(&self, election_id: &str) -> Vec<Candidate> {
        let mut candidates = self
            .lock()
            .candidates
            .iter()
            .filter(|c| c.election_id == election_id)
            .cloned()
            .collect::<Vec<_>>();
        candidates.sort_by_key(|c| (c.ballot_number, c.id));
        candidates
    }

    pub fn find_vote_record(&self, election_id: &str, voter_id: Id) -> Option<VoteRecord> {
        self.lock()
            .vote_records
            .iter()
            .find(|r| r.election_id == election_id && r.voter_id == voter_id)
            .cloned()
    }

    pub fn find_document(&self, id: Id) -> Option<Document> {
        self.lock().documents.iter().find(|d| d.id == id).cloned()
    }

    pub fn find_documents(
        &self,
        query: DocumentQuery,
        page: Option<PaginationRequest>,
    ) -> Vec<Document> {
        let mut documents = self
            .lock()
            .documents
            .iter()
            .filter(|d| query.matches(d))
            .cloned()
            .collect::<Vec<_>>();
        query.sort(&mut documents);
        match page {
            Some(page) => documents
                .into_iter()
                .skip(page.skip() as usize)
                .take(page.page_size() as usize)
                .collect(),
            None => documents,
        }
    }

    pub fn document_count(&self, query: DocumentQuery) -> u64 {
        self.lock()
            .documents
            .iter()
            .filter(|d| query.matches(d))
            .count() as u64
    }

    // Local writes, used to mirror what the remote store returned.

    pub fn upsert_user(&self, user: &User) {
        upsert_by(&mut self.lock().users, user, |u| u.id == user.id);
    }

    pub fn upsert_candidates(&self, candidates: &[Candidate]) {
        let mut tables = self.lock();
        for candidate in candidates {
            upsert_by(&mut tables.candidates, candidate, |c| c.id == candidate.id);
        }
    }

    pub fn upsert_vote_record(&self, record: &VoteRecord) {
        upsert_by(&mut self.lock().vote_records, record, |r| r.id == record.id);
    }

    pub fn upsert_documents(&self, documents: &[Document]) {
        let mut tables = self.lock();
        for document in documents {
            upsert_by(&mut tables.documents, document, |d| d.id == document.id);
        }
    }
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.online()?;
        Ok(self.find_user_by_username(username))
    }

    async fn user(&self, id: Id) -> Result<Option<User>> {
        self.online()?;
        Ok(self.find_user(id))
    }

    async fn count_officers(&self) -> Result<u64> {
        self.online()?;
        Ok(self.officer_count())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        self.online()?;
        let mut tables = self.lock();
        if tables.users.iter().any(|u| u.username == user.username) {
            return Err(duplicate_username(&user.username));
        }
        let user = User {
            id: Id::new(),
            user,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn candidates(&self, election_id: &str) -> Result<Vec<Candidate>> {
        self.online()?;
        Ok(self.find_candidates(election_id))
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate> {
        self.online()?;
        let mut tables = self.lock();
        let taken = tables.candidates.iter().any(|c| {
            c.election_id == candidate.election_id && c.ballot_number == candidate.ballot_number
        });
        if taken {
            return Err(duplicate_ballot_number(
                &candidate.election_id,
                candidate.ballot_number,
            ));
        }
        let candidate = Candidate {
            id: Id::new(),
            candidate,
        };
        tables.candidates.push(candidate.clone());
        Ok(candidate)
    }

    async fn vote_record(&self, election_id: &str, voter_id: Id) -> Result<Option<VoteRecord>> {
        self.online()?;
        Ok(self.find_vote_record(election_id, voter_id))
    }

    async fn cast_vote(
        &self,
        election_id: &str,
        candidate_id: Id,
        voter_id: Id,
    ) -> Result<(Candidate, VoteRecord)> {
        self.online()?;
        // One critical section covers both the record and the counter.
        let mut guard = self.lock();
        let Tables {
            candidates,
            vote_records,
            ..
        } = &mut *guard;

        let candidate = candidates
            .iter_mut()
            .find(|c| c.id == candidate_id && c.election_id == election_id)
            .ok_or_else(|| candidate_not_found(election_id, candidate_id))?;

        let existing = vote_records
            .iter_mut()
            .find(|r| r.election_id == election_id && r.voter_id == voter_id);
        let record = match existing {
            Some(record) if record.has_voted() => return Err(already_voted(election_id)),
            Some(record) => {
                record.candidate_id = Some(candidate_id);
                record.cast_at = now();
                record.clone()
            }
            None => {
                let record = VoteRecord {
                    id: Id::new(),
                    record: VoteRecordCore {
                        election_id: election_id.to_string(),
                        voter_id,
                        candidate_id: Some(candidate_id),
                        cast_at: now(),
                    },
                };
                vote_records.push(record.clone());
                record
            }
        };

        candidate.vote_count += 1;
        debug!(
            "Vote recorded for candidate {} in election '{election_id}'",
            candidate.id
        );
        Ok((candidate.clone(), record))
    }

    async fn insert_document(&self, document: NewDocument) -> Result<Document> {
        self.online()?;
        let document = Document {
            id: Id::new(),
            document,
        };
        self.lock().documents.push(document.clone());
        Ok(document)
    }

    async fn document(&self, id: Id) -> Result<Option<Document>> {
        self.online()?;
        Ok(self.find_document(id))
    }

    async fn documents(
        &self,
        query: DocumentQuery,
        page: Option<PaginationRequest>,
    ) -> Result<Vec<Document>> {
        self.online()?;
        Ok(self.find_documents(query, page))
    }

    async fn count_documents(&self, query: DocumentQuery) -> Result<u64> {
        self.online()?;
        Ok(self.document_count(query))
    }

    async fn change_document(&self, id: Id, change: &DocumentChange) -> Result<Document> {
        self.online()?;
        change.check_transition()?;
        let mut tables = self.lock();
        match tables.documents.iter_mut().find(|d| d.id == id) {
            Some(document) if document.status == change.required_status() => {
                document.apply(change, now());
                Ok(document.clone())
            }
            current => Err(change_refused(id, current.as_deref(), change)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        api::DocumentSubmission,
        common::DocumentStatus,
        db::{NewDocument, NewUser},
    };

    async fn voter(store: &MemoryStore) -> User {
        store.insert_user(NewUser::example_member()).await.unwrap()
    }

    #[rocket::async_test]
    async fn candidates_come_back_in_ballot_order() {
        let store = MemoryStore::new();
        for n in [3, 1, 2] {
            store
                .insert_candidate(NewCandidate::example("e1", n))
                .await
                .unwrap();
        }
        store
            .insert_candidate(NewCandidate::example("other", 0))
            .await
            .unwrap();

        let numbers = store
            .candidates("e1")
            .await
            .unwrap()
            .iter()
            .map(|c| c.ballot_number)
            .collect::<Vec<_>>();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[rocket::async_test]
    async fn ballot_numbers_are_unique_per_election() {
        let store = MemoryStore::new();
        store
            .insert_candidate(NewCandidate::example("e1", 1))
            .await
            .unwrap();
        assert!(store
            .insert_candidate(NewCandidate::example("e1", 1))
            .await
            .is_err());
        assert!(store
            .insert_candidate(NewCandidate::example("e2", 1))
            .await
            .is_ok());
    }

    #[rocket::async_test]
    async fn usernames_are_unique() {
        let store = MemoryStore::new();
        voter(&store).await;
        assert!(store.insert_user(NewUser::example_member()).await.is_err());
    }

    #[rocket::async_test]
    async fn one_vote_per_voter_per_election() {
        let store = MemoryStore::new();
        let voter = voter(&store).await;
        let first = store
            .insert_candidate(NewCandidate::example("e1", 1))
            .await
            .unwrap();
        let second = store
            .insert_candidate(NewCandidate::example("e1", 2))
            .await
            .unwrap();

        let (candidate, record) = store.cast_vote("e1", first.id, voter.id).await.unwrap();
        assert_eq!(candidate.vote_count, 1);
        assert_eq!(record.candidate_id, Some(first.id));

        let err = store
            .cast_vote("e1", second.id, voter.id)
            .await
            .unwrap_err();
        assert_eq!(err.status(), rocket::http::Status::Conflict);

        // Nothing changed on the refused attempt.
        let counts = store
            .candidates("e1")
            .await
            .unwrap()
            .iter()
            .map(|c| c.vote_count)
            .collect::<Vec<_>>();
        assert_eq!(counts, vec![1, 0]);
    }

    #[rocket::async_test]
    async fn empty_vote_record_does_not_block_voting() {
        let store = MemoryStore::new();
        let voter = voter(&store).await;
        let candidate = store
            .insert_candidate(NewCandidate::example("e1", 1))
            .await
            .unwrap();
        let placeholder = VoteRecord {
            id: Id::new(),
            record: VoteRecordCore {
                election_id: "e1".to_string(),
                voter_id: voter.id,
                candidate_id: None,
                cast_at: now(),
            },
        };
        store.upsert_vote_record(&placeholder);

        let (_, record) = store.cast_vote("e1", candidate.id, voter.id).await.unwrap();
        assert_eq!(record.id, placeholder.id);
        assert!(record.has_voted());
    }

    #[rocket::async_test]
    async fn candidate_must_stand_in_the_election() {
        let store = MemoryStore::new();
        let voter = voter(&store).await;
        let elsewhere = store
            .insert_candidate(NewCandidate::example("e2", 1))
            .await
            .unwrap();

        let err = store
            .cast_vote("e1", elsewhere.id, voter.id)
            .await
            .unwrap_err();
        assert_eq!(err.status(), rocket::http::Status::NotFound);
        assert!(store.vote_record("e1", voter.id).await.unwrap().is_none());
    }

    #[rocket::async_test]
    async fn second_review_conflicts() {
        let store = MemoryStore::new();
        let submitter = voter(&store).await;
        let document = store
            .insert_document(NewDocument::example(&submitter, "Budget"))
            .await
            .unwrap();
        let approve = DocumentChange::Review {
            status: DocumentStatus::Approved,
            reason: None,
            reviewer_id: Id::new(),
        };
        let reject = DocumentChange::Review {
            status: DocumentStatus::Rejected,
            reason: Some("Too late".into()),
            reviewer_id: Id::new(),
        };

        let approved = store.change_document(document.id, &approve).await.unwrap();
        assert_eq!(approved.status, DocumentStatus::Approved);

        let err = store
            .change_document(document.id, &reject)
            .await
            .unwrap_err();
        assert_eq!(err.status(), rocket::http::Status::Conflict);
        assert_eq!(
            store.document(document.id).await.unwrap().unwrap().status,
            DocumentStatus::Approved
        );
    }

    #[rocket::async_test]
    async fn review_back_to_pending_is_refused() {
        let store = MemoryStore::new();
        let submitter = voter(&store).await;
        let document = store
            .insert_document(NewDocument::example(&submitter, "Budget"))
            .await
            .unwrap();
        let reviewer = Id::new();
        let change = DocumentChange::Review {
            status: DocumentStatus::Pending,
            reason: Some("Looked at it".into()),
            reviewer_id: reviewer,
        };

        let err = store
            .change_document(document.id, &change)
            .await
            .unwrap_err();

        assert_eq!(err.status(), rocket::http::Status::BadRequest);
        let stored = store.document(document.id).await.unwrap().unwrap();
        assert_eq!(stored.reviewer_id, None);
        assert_eq!(stored.updated_at, document.updated_at);
    }

    #[rocket::async_test]
    async fn changing_a_missing_document_is_not_found() {
        let store = MemoryStore::new();
        let change = DocumentChange::Resubmit(DocumentSubmission::example());
        let err = store.change_document(Id::new(), &change).await.unwrap_err();
        assert_eq!(err.status(), rocket::http::Status::NotFound);
    }

    #[rocket::async_test]
    async fn reviewed_documents_leave_the_inbox() {
        let store = MemoryStore::new();
        let submitter = voter(&store).await;
        let mut ids = Vec::new();
        for title in ["A", "B", "C"] {
            let document = store
                .insert_document(NewDocument::example(&submitter, title))
                .await
                .unwrap();
            ids.push(document.id);
        }
        let reviewer_id = Id::new();
        for (id, status) in [(ids[0], DocumentStatus::Approved), (ids[1], DocumentStatus::Rejected)] {
            let change = DocumentChange::Review {
                status,
                reason: None,
                reviewer_id,
            };
            store.change_document(id, &change).await.unwrap();
        }

        let inbox = store.documents(DocumentQuery::Inbox, None).await.unwrap();
        assert_eq!(inbox.iter().map(|d| d.id).collect::<Vec<_>>(), vec![ids[2]]);

        let history = store.documents(DocumentQuery::History, None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|d| d.status != DocumentStatus::Pending));
        assert_eq!(store.count_documents(DocumentQuery::History).await.unwrap(), 2);

        let page = PaginationRequest::new(2, 1);
        let second = store
            .documents(DocumentQuery::History, Some(page))
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
    }

    #[rocket::async_test]
    async fn offline_store_refuses_everything() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let err = store.candidates("e1").await.unwrap_err();
        assert!(err.is_store_failure());
    }

    #[rocket::async_test]
    async fn snapshot_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let store = MemoryStore::new();
        let submitter = voter(&store).await;
        let candidate = store
            .insert_candidate(NewCandidate::example("e1", 1))
            .await
            .unwrap();
        store
            .cast_vote("e1", candidate.id, submitter.id)
            .await
            .unwrap();
        let document = store
            .insert_document(NewDocument::example(&submitter, "Budget"))
            .await
            .unwrap();
        store.save_snapshot(&path).unwrap();

        let restored = MemoryStore::load_snapshot(&path).unwrap();
        assert_eq!(restored.find_user(submitter.id), Some(submitter.clone()));
        assert_eq!(restored.find_candidates("e1")[0].vote_count, 1);
        assert!(restored
            .find_vote_record("e1", submitter.id)
            .unwrap()
            .has_voted());
        assert_eq!(restored.find_document(document.id), Some(document));
    }

    #[test]
    fn missing_snapshot_gives_empty_tables() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::load_snapshot(&dir.path().join("absent.json")).unwrap();
        assert_eq!(store.officer_count(), 0);
    }
}
