use log::info;
use rocket::{serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{DocumentDescription, DocumentSubmission, Paginated, PaginationRequest, StatusUpdate},
        auth::{Caller, Officer},
        common::now,
        db::{DocumentChange, NewDocument},
        mongodb::Id,
        store::{DocumentQuery, Repo, Store},
    },
    notify::{Notification, Notifier},
};

pub fn routes() -> Vec<Route> {
    routes![
        submit_document,
        inbox,
        history,
        my_documents,
        get_document,
        review_document,
        resubmit_document,
    ]
}

fn describe_all(documents: Vec<crate::model::db::Document>) -> Vec<DocumentDescription> {
    documents.into_iter().map(Into::into).collect()
}

#[post("/documents", data = "<submission>", format = "json")]
async fn submit_document(
    caller: Caller,
    submission: Json<DocumentSubmission>,
    repo: Repo,
    notifier: &State<Notifier>,
) -> Result<Json<DocumentDescription>> {
    let submission = submission.into_inner().validated()?;
    let document = repo
        .insert_document(NewDocument::new(submission, &caller, now()))
        .await?;
    info!("'{}' submitted document {}", caller.username, document.id);

    notifier
        .send(Notification::DocumentSubmitted(&document))
        .await;
    Ok(Json(document.into()))
}

/// Pending documents, oldest first.
#[get("/documents/inbox")]
async fn inbox(_caller: Caller<Officer>, repo: Repo) -> Result<Json<Vec<DocumentDescription>>> {
    let documents = repo.documents(DocumentQuery::Inbox, None).await?;
    Ok(Json(describe_all(documents)))
}

/// Reviewed documents, most recently updated first.
#[get("/documents/history?<page..>")]
async fn history(
    _caller: Caller<Officer>,
    page: PaginationRequest,
    repo: Repo,
) -> Result<Json<Paginated<DocumentDescription>>> {
    let total = repo.count_documents(DocumentQuery::History).await?;
    let documents = repo.documents(DocumentQuery::History, Some(page)).await?;
    Ok(Json(page.to_paginated(total, describe_all(documents))))
}

#[get("/documents/mine")]
async fn my_documents(caller: Caller, repo: Repo) -> Result<Json<Vec<DocumentDescription>>> {
    let documents = repo
        .documents(DocumentQuery::SubmittedBy(caller.id), None)
        .await?;
    Ok(Json(describe_all(documents)))
}

#[get("/documents/<document_id>")]
async fn get_document(
    caller: Caller,
    document_id: Id,
    repo: Repo,
) -> Result<Json<DocumentDescription>> {
    let document = repo
        .document(document_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Document '{document_id}'")))?;
    if !caller.is_officer() && document.submitter_id != caller.id {
        return Err(Error::forbidden(
            "Only officers and the submitter can view a document",
        ));
    }
    Ok(Json(document.into()))
}

#[put("/documents/<document_id>/status", data = "<update>", format = "json")]
async fn review_document(
    caller: Caller<Officer>,
    document_id: Id,
    update: Json<StatusUpdate>,
    repo: Repo,
    notifier: &State<Notifier>,
) -> Result<Json<DocumentDescription>> {
    let update = update.into_inner().validated()?;
    let change = DocumentChange::Review {
        status: update.status,
        reason: update.reason,
        reviewer_id: caller.id,
    };
    let document = repo.change_document(document_id, &change).await?;
    info!(
        "'{}' marked document {document_id} as {:?}",
        caller.username, document.status
    );

    notifier
        .send(Notification::DocumentReviewed(&document))
        .await;
    Ok(Json(document.into()))
}

#[put("/documents/<document_id>", data = "<submission>", format = "json")]
async fn resubmit_document(
    caller: Caller,
    document_id: Id,
    submission: Json<DocumentSubmission>,
    repo: Repo,
    notifier: &State<Notifier>,
) -> Result<Json<DocumentDescription>> {
    let submission = submission.into_inner().validated()?;
    let current = repo
        .document(document_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Document '{document_id}'")))?;
    if current.submitter_id != caller.id {
        return Err(Error::forbidden(
            "Only the submitter can resubmit a document",
        ));
    }

    let change = DocumentChange::Resubmit(submission);
    let document = repo.change_document(document_id, &change).await?;
    info!("'{}' resubmitted document {document_id}", caller.username);

    notifier
        .send(Notification::DocumentResubmitted(&document))
        .await;
    Ok(Json(document.into()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json::json,
    };

    use crate::model::{
        api::NewAccount,
        common::DocumentStatus,
        db::{Document, User},
        store::MemoryStore,
    };

    use super::*;

    async fn user_named(store: &MemoryStore, account: NewAccount) -> User {
        store
            .user_by_username(&account.username)
            .await
            .unwrap()
            .unwrap()
    }

    /// A pending document submitted by a member other than the signed-in one.
    async fn pending_document(store: &MemoryStore, title: &str) -> Document {
        let submitter = match store
            .user_by_username(&NewAccount::example_member2().username)
            .await
            .unwrap()
        {
            Some(user) => user,
            None => store
                .insert_user(NewAccount::example_member2().try_into().unwrap())
                .await
                .unwrap(),
        };
        store
            .insert_document(NewDocument::example(&submitter, title))
            .await
            .unwrap()
    }

    async fn review(client: &Client, id: Id, status: DocumentStatus) -> Status {
        client
            .put(uri!(review_document(id)))
            .header(ContentType::JSON)
            .body(json!({ "status": status, "reason": "  " }).to_string())
            .dispatch()
            .await
            .status()
    }

    async fn resubmit(client: &Client, id: Id) -> Status {
        client
            .put(uri!(resubmit_document(id)))
            .header(ContentType::JSON)
            .body(json!(DocumentSubmission::example()).to_string())
            .dispatch()
            .await
            .status()
    }

    #[backend_test(member)]
    async fn member_submits_document(client: Client, store: MemoryStore) {
        let response = client
            .post(uri!(submit_document))
            .header(ContentType::JSON)
            .body(json!(DocumentSubmission::example()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Ok, response.status());
        let submitted: DocumentDescription = response.into_json().await.unwrap();
        assert_eq!(submitted.status, DocumentStatus::Pending);
        assert_eq!(submitted.created_at, submitted.updated_at);

        let member = user_named(&store, NewAccount::example_member()).await;
        assert_eq!(submitted.submitter_id, member.id.to_string());
        assert_eq!(submitted.submitter_name, member.display_name);
    }

    #[backend_test(member)]
    async fn blank_fields_are_refused_before_writing(client: Client, store: MemoryStore) {
        for body in [
            json!({ "title": " ", "kind": "Proposal", "url": "https://x.org/a.pdf" }),
            json!({ "title": "Budget", "kind": "FinancialReport", "url": "" }),
        ] {
            let response = client
                .post(uri!(submit_document))
                .header(ContentType::JSON)
                .body(body.to_string())
                .dispatch()
                .await;
            assert_eq!(Status::BadRequest, response.status());
        }
        assert_eq!(store.count_documents(DocumentQuery::Inbox).await.unwrap(), 0);
    }

    #[backend_test(officer)]
    async fn inbox_lists_pending_oldest_first(client: Client, store: MemoryStore) {
        let first = pending_document(&store, "First").await;
        let second = pending_document(&store, "Second").await;
        let reviewed = pending_document(&store, "Reviewed").await;
        assert_eq!(Status::Ok, review(&client, reviewed.id, DocumentStatus::Approved).await);

        let inbox: Vec<DocumentDescription> = client
            .get(uri!(inbox))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();

        let ids: Vec<String> = inbox.into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![first.id.to_string(), second.id.to_string()]);
    }

    #[backend_test(officer)]
    async fn review_moves_document_to_history(client: Client, store: MemoryStore) {
        let document = pending_document(&store, "Budget").await;

        assert_eq!(Status::Ok, review(&client, document.id, DocumentStatus::Rejected).await);

        let stored = store.document(document.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Rejected);
        assert_eq!(stored.reason, None);
        let officer = user_named(&store, NewAccount::example_officer()).await;
        assert_eq!(stored.reviewer_id, Some(officer.id));

        let history: Paginated<DocumentDescription> = client
            .get("/documents/history")
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(history.pagination.total, 1);
        assert_eq!(history.items[0].id, document.id.to_string());
    }

    #[backend_test(officer)]
    async fn history_is_paginated(client: Client, store: MemoryStore) {
        for title in ["A", "B", "C"] {
            let document = pending_document(&store, title).await;
            review(&client, document.id, DocumentStatus::Approved).await;
        }

        let page: Paginated<DocumentDescription> = client
            .get("/documents/history?page_num=2&page_size=2")
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();

        assert_eq!(page.pagination.total, 3);
        assert_eq!(page.items.len(), 1);
        // Most recently updated first, so the last page holds the oldest review.
        assert_eq!(page.items[0].title, "A");
    }

    #[backend_test(officer)]
    async fn second_review_conflicts(client: Client, store: MemoryStore) {
        let document = pending_document(&store, "Budget").await;

        assert_eq!(Status::Ok, review(&client, document.id, DocumentStatus::Approved).await);
        assert_eq!(
            Status::Conflict,
            review(&client, document.id, DocumentStatus::Rejected).await
        );

        let stored = store.document(document.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Approved);
    }

    #[backend_test(officer)]
    async fn pending_is_not_a_review_outcome(client: Client, store: MemoryStore) {
        let document = pending_document(&store, "Budget").await;
        assert_eq!(
            Status::BadRequest,
            review(&client, document.id, DocumentStatus::Pending).await
        );
        assert_eq!(
            Status::NotFound,
            review(&client, Id::new(), DocumentStatus::Approved).await
        );
    }

    #[backend_test(member)]
    async fn member_cannot_review(client: Client, store: MemoryStore) {
        let document = pending_document(&store, "Budget").await;

        assert_eq!(
            Status::Forbidden,
            review(&client, document.id, DocumentStatus::Approved).await
        );
        assert_eq!(Status::Forbidden, client.get(uri!(inbox)).dispatch().await.status());
    }

    #[backend_test(member)]
    async fn submitter_resubmits_after_revision(client: Client, store: MemoryStore) {
        let member = user_named(&store, NewAccount::example_member()).await;
        let document = store
            .insert_document(NewDocument::example(&member, "Draft"))
            .await
            .unwrap();
        let revision = DocumentChange::Review {
            status: DocumentStatus::Revision,
            reason: Some("Add the budget table".into()),
            reviewer_id: Id::new(),
        };
        store.change_document(document.id, &revision).await.unwrap();

        let response = client
            .put(uri!(resubmit_document(document.id)))
            .header(ContentType::JSON)
            .body(json!(DocumentSubmission::example()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Ok, response.status());
        let resubmitted: DocumentDescription = response.into_json().await.unwrap();
        assert_eq!(resubmitted.status, DocumentStatus::Pending);
        assert_eq!(resubmitted.title, DocumentSubmission::example().title);
        assert_eq!(resubmitted.reason, None);
        assert_eq!(resubmitted.reviewer_id, None);
    }

    #[backend_test(member)]
    async fn only_revisions_of_own_documents_can_be_resubmitted(
        client: Client,
        store: MemoryStore,
    ) {
        let member = user_named(&store, NewAccount::example_member()).await;
        let own = store
            .insert_document(NewDocument::example(&member, "Draft"))
            .await
            .unwrap();
        let foreign = pending_document(&store, "Not mine").await;

        // Still pending, so there is nothing to resubmit.
        assert_eq!(Status::Conflict, resubmit(&client, own.id).await);
        assert_eq!(Status::Forbidden, resubmit(&client, foreign.id).await);
    }

    #[backend_test(member)]
    async fn documents_are_private_to_submitter_and_officers(client: Client, store: MemoryStore) {
        let member = user_named(&store, NewAccount::example_member()).await;
        let own = store
            .insert_document(NewDocument::example(&member, "Mine"))
            .await
            .unwrap();
        let foreign = pending_document(&store, "Not mine").await;

        let response = client.get(uri!(get_document(own.id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let response = client.get(uri!(get_document(foreign.id))).dispatch().await;
        assert_eq!(Status::Forbidden, response.status());

        let mine: Vec<DocumentDescription> = client
            .get(uri!(my_documents))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, own.id.to_string());
    }

    #[backend_test(officer)]
    async fn inbox_survives_a_lost_remote(client: Client, store: MemoryStore) {
        let document = pending_document(&store, "Budget").await;
        client.get(uri!(inbox)).dispatch().await;

        store.set_offline(true);

        let inbox: Vec<DocumentDescription> = client
            .get(uri!(inbox))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].id, document.id.to_string());

        assert_eq!(
            Status::ServiceUnavailable,
            review(&client, document.id, DocumentStatus::Approved).await
        );
    }
}
