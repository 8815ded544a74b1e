use log::debug;
use mongodb::{
    bson::{doc, Bson, Document as BsonDocument},
    error::TRANSIENT_TRANSACTION_ERROR,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    results::InsertOneResult,
    Client, Database,
};
use rocket::{futures::TryStreamExt, http::Status};

use crate::error::{Error, Result};
use crate::model::{
    api::PaginationRequest,
    common::{now, DocumentStatus, Rights},
    db::{
        Candidate, Document, DocumentChange, NewCandidate, NewDocument, NewUser, User, VoteRecord,
    },
    store::{
        already_voted, candidate_not_found, change_refused, duplicate_ballot_number,
        duplicate_username, DocumentQuery, Store,
    },
};

use super::{is_duplicate_key_error, Coll, Id, MongoCollection};

/// The remote store: a MongoDB database.
///
/// Vote casting uses a multi-document transaction, so the deployment must be
/// a replica set.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub fn new(client: Client, db: Database) -> Self {
        Self { client, db }
    }

    fn coll<T: MongoCollection>(&self) -> Coll<T> {
        Coll::from_db(&self.db)
    }

    /// One attempt at the vote transaction.
    async fn try_cast_vote(
        &self,
        election_id: &str,
        candidate_id: Id,
        voter_id: Id,
    ) -> Result<(Candidate, VoteRecord)> {
        // Dropping the session before the commit aborts the transaction, so
        // every early return below leaves the database untouched.
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        // The candidate must stand in this election.
        let candidate_filter = doc! {
            "_id": candidate_id,
            "election_id": election_id,
        };
        self.coll::<Candidate>()
            .find_one_with_session(candidate_filter.clone(), None, &mut session)
            .await?
            .ok_or_else(|| candidate_not_found(election_id, candidate_id))?;

        // Claim the voter's record. Only a missing or empty record matches the
        // filter; an existing vote makes the upsert collide with the unique
        // (election_id, voter_id) index.
        let record_filter = doc! {
            "election_id": election_id,
            "voter_id": voter_id,
            "candidate_id": Bson::Null,
        };
        let record_update = doc! {
            "$set": {
                "candidate_id": candidate_id,
                "cast_at": Bson::DateTime(now().into()),
            }
        };
        let upsert = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        let record = match self
            .coll::<VoteRecord>()
            .find_one_and_update_with_session(record_filter, record_update, upsert, &mut session)
            .await
        {
            Ok(Some(record)) => record,
            Ok(None) => {
                return Err(Error::Status(
                    Status::InternalServerError,
                    "Vote record upsert returned nothing".to_string(),
                ))
            }
            Err(e) if is_duplicate_key_error(&e) => return Err(already_voted(election_id)),
            Err(e) => return Err(e.into()),
        };

        // Count the vote.
        let increment = doc! { "$inc": { "vote_count": 1_i64 } };
        let candidate = self
            .coll::<Candidate>()
            .find_one_and_update_with_session(
                candidate_filter,
                increment,
                return_after(),
                &mut session,
            )
            .await?
            .ok_or_else(|| candidate_not_found(election_id, candidate_id))?;

        session.commit_transaction().await?;
        debug!("Vote recorded for candidate {candidate_id} in election '{election_id}'");
        Ok((candidate, record))
    }
}

/// How many times a vote transaction is run before a conflict is given up on.
const VOTE_ATTEMPTS: u32 = 3;

/// Did the transaction lose out to a concurrent one, such that running it
/// again may succeed?
fn is_transient(err: &Error) -> bool {
    matches!(err, Error::Db(e) if e.contains_label(TRANSIENT_TRANSACTION_ERROR))
}

/// Extract the ID the database assigned to a freshly inserted document.
fn inserted_id(result: InsertOneResult) -> Result<Id> {
    result
        .inserted_id
        .as_object_id()
        .map(Id::from)
        .ok_or_else(|| {
            Error::Status(
                Status::InternalServerError,
                format!("Database returned a non-ObjectId key {}", result.inserted_id),
            )
        })
}

fn query_filter(query: DocumentQuery) -> BsonDocument {
    match query {
        DocumentQuery::Inbox => doc! { "status": DocumentStatus::Pending },
        DocumentQuery::History => doc! { "status": { "$ne": DocumentStatus::Pending } },
        DocumentQuery::SubmittedBy(user) => doc! { "submitter_id": user },
    }
}

fn query_sort(query: DocumentQuery) -> BsonDocument {
    match query {
        DocumentQuery::Inbox => doc! { "created_at": 1, "_id": 1 },
        DocumentQuery::History => doc! { "updated_at": -1, "_id": -1 },
        DocumentQuery::SubmittedBy(_) => doc! { "created_at": -1, "_id": -1 },
    }
}

fn return_after() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        let filter = doc! { "username": username };
        Ok(self.coll::<User>().find_one(filter, None).await?)
    }

    async fn user(&self, id: Id) -> Result<Option<User>> {
        Ok(self.coll::<User>().find_one(id.as_doc(), None).await?)
    }

    async fn count_officers(&self) -> Result<u64> {
        let filter = doc! { "rights": { "$gte": Rights::Officer } };
        Ok(self.coll::<User>().count_documents(filter, None).await?)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let result = Coll::<NewUser>::from_db(&self.db)
            .insert_one(&user, None)
            .await;
        let id = match result {
            Ok(result) => inserted_id(result)?,
            Err(e) if is_duplicate_key_error(&e) => return Err(duplicate_username(&user.username)),
            Err(e) => return Err(e.into()),
        };
        Ok(User { id, user })
    }

    async fn candidates(&self, election_id: &str) -> Result<Vec<Candidate>> {
        let filter = doc! { "election_id": election_id };
        let options = FindOptions::builder()
            .sort(doc! { "ballot_number": 1, "_id": 1 })
            .build();
        let candidates: Vec<Candidate> = self
            .coll::<Candidate>()
            .find(filter, options)
            .await?
            .try_collect()
            .await?;
        Ok(candidates)
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate> {
        let result = Coll::<NewCandidate>::from_db(&self.db)
            .insert_one(&candidate, None)
            .await;
        let id = match result {
            Ok(result) => inserted_id(result)?,
            Err(e) if is_duplicate_key_error(&e) => {
                return Err(duplicate_ballot_number(
                    &candidate.election_id,
                    candidate.ballot_number,
                ))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Candidate { id, candidate })
    }

    async fn vote_record(&self, election_id: &str, voter_id: Id) -> Result<Option<VoteRecord>> {
        let filter = doc! {
            "election_id": election_id,
            "voter_id": voter_id,
        };
        Ok(self.coll::<VoteRecord>().find_one(filter, None).await?)
    }

    async fn cast_vote(
        &self,
        election_id: &str,
        candidate_id: Id,
        voter_id: Id,
    ) -> Result<(Candidate, VoteRecord)> {
        let mut attempt = 1;
        loop {
            match self.try_cast_vote(election_id, candidate_id, voter_id).await {
                // A concurrent vote touched the same documents. The rerun
                // sees its outcome, so a repeated vote turns into a conflict.
                Err(e) if is_transient(&e) && attempt < VOTE_ATTEMPTS => {
                    debug!("Vote transaction in election '{election_id}' collided, retrying: {e}");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn insert_document(&self, document: NewDocument) -> Result<Document> {
        let result = Coll::<NewDocument>::from_db(&self.db)
            .insert_one(&document, None)
            .await?;
        let id = inserted_id(result)?;
        Ok(Document { id, document })
    }

    async fn document(&self, id: Id) -> Result<Option<Document>> {
        Ok(self.coll::<Document>().find_one(id.as_doc(), None).await?)
    }

    async fn documents(
        &self,
        query: DocumentQuery,
        page: Option<PaginationRequest>,
    ) -> Result<Vec<Document>> {
        let options = FindOptions::builder()
            .sort(query_sort(query))
            .skip(page.map(|p| p.skip()))
            .limit(page.map(|p| i64::from(p.page_size())))
            .build();
        let documents: Vec<Document> = self
            .coll::<Document>()
            .find(query_filter(query), options)
            .await?
            .try_collect()
            .await?;
        Ok(documents)
    }

    async fn count_documents(&self, query: DocumentQuery) -> Result<u64> {
        Ok(self
            .coll::<Document>()
            .count_documents(query_filter(query), None)
            .await?)
    }

    async fn change_document(&self, id: Id, change: &DocumentChange) -> Result<Document> {
        change.check_transition()?;
        let mut filter = id.as_doc();
        filter.insert("status", change.required_status());
        let updated = self
            .coll::<Document>()
            .find_one_and_update(filter, change.to_update(now()), return_after())
            .await?;
        match updated {
            Some(document) => Ok(document),
            None => {
                // Either the document is gone or someone else got there first.
                let current = self.coll::<Document>().find_one(id.as_doc(), None).await?;
                Err(change_refused(id, current.as_ref(), change))
            }
        }
    }
}
