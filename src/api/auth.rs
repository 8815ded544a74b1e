use log::info;
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    config::Config,
    error::{Error, Result},
    model::{
        api::{Credentials, UserDescription},
        auth::{AuthToken, Member, AUTH_TOKEN_COOKIE},
        store::{Repo, Store},
    },
};

pub fn routes() -> Vec<Route> {
    routes![login, logout]
}

#[post("/auth/login", data = "<credentials>", format = "json")]
async fn login(
    cookies: &CookieJar<'_>,
    credentials: Json<Credentials>,
    repo: Repo,
    config: &State<Config>,
) -> Result<Json<UserDescription>> {
    let user = repo
        .user_by_username(credentials.username.trim())
        .await?
        .filter(|user| user.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::Status(
                Status::Unauthorized,
                "No user found with the provided username and password combination.".to_string(),
            )
        })?;

    let token = AuthToken::<Member>::for_user(&user);
    cookies.add(token.into_cookie(config));
    info!("'{}' signed in as {}", user.username, user.rights);

    Ok(Json(user.into()))
}

#[delete("/auth")]
fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}
