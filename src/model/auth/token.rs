use std::{marker::PhantomData, ops::Deref};

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite, Status},
    outcome::try_outcome,
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::{
    common::Rights,
    db::User,
    mongodb::Id,
    store::{Repo, Store},
};

use super::role::{Member, Role};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token representing a specific user with specific rights.
///
/// As a request guard, the token must be present, valid and grant at least
/// `R::RIGHTS`.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<R = Member> {
    pub id: Id,
    #[serde(rename = "rgt")]
    pub rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<R>,
}

impl<R> AuthToken<R> {
    /// Create a new [`AuthToken`] carrying the given user's rights.
    pub fn for_user(user: &User) -> Self {
        Self {
            id: user.id,
            rights: user.rights,
            phantom: PhantomData,
        }
    }

    /// Does this token permit the given rights?
    pub fn permits(&self, target: Rights) -> bool {
        self.rights >= target
    }

    #[allow(clippy::missing_panics_doc)]
    /// Serialize this token into a cookie.
    pub fn into_cookie(self, config: &Config) -> Cookie<'static> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .expect("JWT encoding is infallible with default settings");

        Cookie::build(AUTH_TOKEN_COOKIE, token)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish()
    }

    /// Deserialize a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'static>, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<R>>| claims.claims.token)?;
        Ok(token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<R> {
    #[serde(flatten, bound = "")]
    token: AuthToken<R>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

fn not_signed_in() -> Error {
    Error::Status(Status::Unauthorized, "Not signed in".to_string())
}

fn lacks_rights(required: Rights) -> Error {
    Error::forbidden(format!("This action requires {required} rights"))
}

#[rocket::async_trait]
impl<'r, R: Role> FromRequest<'r> for AuthToken<R> {
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie and verify that it grants the
    /// rights of role `R`.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let Some(cookie) = req.cookies().get(AUTH_TOKEN_COOKIE) else {
            return Outcome::Failure((Status::Unauthorized, not_signed_in()));
        };

        let token: Self = match Self::from_cookie(cookie, config) {
            Ok(token) => token,
            Err(e) => return Outcome::Failure((Status::Unauthorized, e)),
        };

        if !token.permits(R::RIGHTS) {
            return Outcome::Failure((Status::Forbidden, lacks_rights(R::RIGHTS)));
        }
        Outcome::Success(token)
    }
}

/// The signed-in user behind a request, holding at least the rights of role `R`.
///
/// Rights are checked against the stored account as well as the token, so a
/// demoted or deleted account loses access immediately.
pub struct Caller<R = Member> {
    pub user: User,
    phantom: PhantomData<R>,
}

impl<R> Deref for Caller<R> {
    type Target = User;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

#[rocket::async_trait]
impl<'r, R: Role> FromRequest<'r> for Caller<R> {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let token = try_outcome!(req.guard::<AuthToken<R>>().await);

        // Unwrap is safe as `Repo` is always managed.
        let repo = req.guard::<Repo>().await.unwrap();
        let user = match repo.user(token.id).await {
            Ok(Some(user)) => user,
            Ok(None) => return Outcome::Failure((Status::Unauthorized, not_signed_in())),
            Err(e) => return Outcome::Failure((e.status(), e)),
        };

        if user.rights < R::RIGHTS {
            return Outcome::Failure((Status::Forbidden, lacks_rights(R::RIGHTS)));
        }
        Outcome::Success(Self {
            user,
            phantom: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        auth::Officer,
        db::{NewUser, User},
    };

    fn user(user: NewUser) -> User {
        User { id: Id::new(), user }
    }

    #[test]
    fn token_survives_the_cookie() {
        let config = Config::example();
        let officer = user(NewUser::example_officer());

        let cookie = AuthToken::<Member>::for_user(&officer).into_cookie(&config);
        let token = AuthToken::<Officer>::from_cookie(&cookie, &config).unwrap();

        assert_eq!(token.id, officer.id);
        assert_eq!(token.rights, Rights::Officer);
    }

    #[test]
    fn foreign_signature_is_refused() {
        let member = user(NewUser::example_member());
        let cookie = AuthToken::<Member>::for_user(&member).into_cookie(&Config::example());

        let other = Config::with_secret("some other secret");
        assert!(AuthToken::<Member>::from_cookie(&cookie, &other).is_err());
    }

    #[test]
    fn officer_rights_include_member_rights() {
        let officer = AuthToken::<Member>::for_user(&user(NewUser::example_officer()));
        assert!(officer.permits(Rights::Member));
        assert!(officer.permits(Rights::Officer));

        let member = AuthToken::<Member>::for_user(&user(NewUser::example_member()));
        assert!(member.permits(Rights::Member));
        assert!(!member.permits(Rights::Officer));
    }
}
