use log::info;
use rocket::{serde::json::Json, Route};

use crate::{
    error::Result,
    model::{
        api::{NewAccount, UserDescription},
        auth::{Caller, Officer},
        db::NewUser,
        store::{Repo, Store},
    },
};

pub fn routes() -> Vec<Route> {
    routes![create_user, me]
}

#[post("/users", data = "<account>", format = "json")]
async fn create_user(
    caller: Caller<Officer>,
    account: Json<NewAccount>,
    repo: Repo,
) -> Result<Json<UserDescription>> {
    let user: NewUser = account.into_inner().try_into()?;
    let user = repo.insert_user(user).await?;
    info!(
        "'{}' created {} account '{}'",
        caller.username, user.rights, user.username
    );
    Ok(Json(user.into()))
}

#[get("/users/me")]
fn me(caller: Caller) -> Json<UserDescription> {
    Json(caller.user.into())
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json::json,
    };

    use crate::model::{common::Rights, store::MemoryStore};

    use super::*;

    #[backend_test(officer)]
    async fn officer_creates_member(client: Client, store: MemoryStore) {
        let response = client
            .post(uri!(create_user))
            .header(ContentType::JSON)
            .body(json!(NewAccount::example_member()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Ok, response.status());
        let created: UserDescription = response.into_json().await.unwrap();
        assert_eq!(created.rights, Rights::Member);

        // The new member can sign in.
        let stored = store
            .user_by_username(&NewAccount::example_member().username)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.verify_password(NewAccount::example_member().password));
    }

    #[backend_test(officer)]
    async fn duplicate_username_conflicts(client: Client) {
        let body = json!(NewAccount::example_member2()).to_string();

        let first = client
            .post(uri!(create_user))
            .header(ContentType::JSON)
            .body(&body)
            .dispatch()
            .await;
        assert_eq!(Status::Ok, first.status());

        let second = client
            .post(uri!(create_user))
            .header(ContentType::JSON)
            .body(&body)
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, second.status());
    }

    #[backend_test(officer)]
    async fn weak_password_is_refused(client: Client) {
        let mut account = NewAccount::example_member();
        account.password = "short".to_string();

        let response = client
            .post(uri!(create_user))
            .header(ContentType::JSON)
            .body(json!(account).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::BadRequest, response.status());
    }

    #[backend_test(member)]
    async fn member_cannot_create_accounts(client: Client, store: MemoryStore) {
        let response = client
            .post(uri!(create_user))
            .header(ContentType::JSON)
            .body(json!(NewAccount::example_member2()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Forbidden, response.status());
        let username = NewAccount::example_member2().username;
        assert_eq!(None, store.user_by_username(&username).await.unwrap());
    }

    #[backend_test(member)]
    async fn me_describes_the_caller(client: Client) {
        let response = client.get(uri!(me)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
        let me: UserDescription = response.into_json().await.unwrap();
        assert_eq!(me.username, NewAccount::example_member().username);
    }

    #[backend_test]
    async fn me_requires_sign_in(client: Client) {
        let response = client.get(uri!(me)).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(member)]
    async fn stale_token_of_deleted_account_is_refused(client: Client) {
        // A fresh client that shares no users with the one that signed in.
        let other = Client::tracked(crate::rocket_for_store(
            std::sync::Arc::new(MemoryStore::new()),
            crate::test_figment(),
        ))
        .await
        .unwrap();
        let cookie = client
            .cookies()
            .get(crate::model::auth::AUTH_TOKEN_COOKIE)
            .unwrap()
            .clone();

        let response = other.get(uri!(me)).cookie(cookie).dispatch().await;

        assert_eq!(Status::Unauthorized, response.status());
    }
}
