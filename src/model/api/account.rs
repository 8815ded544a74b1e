use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::required,
    common::Rights,
    db::{NewUser, User},
};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Raw sign-in credentials, received from a user. These are never stored
/// directly, since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// An account an officer wishes to create.
#[derive(Clone, Deserialize, Serialize)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub rights: Rights,
}

impl TryFrom<NewAccount> for NewUser {
    type Error = Error;

    /// Convert a [`NewAccount`] to a [`NewUser`] by hashing the password.
    /// This enforces that the username is non-empty, the display name is not
    /// blank, and the password meets minimum length.
    fn try_from(account: NewAccount) -> Result<Self> {
        let username = account.username.trim().to_string();
        if username.is_empty() {
            return Err(Error::bad_request("Username must not be empty"));
        }
        if account.password.len() < MIN_PASSWORD_LENGTH {
            return Err(Error::bad_request(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        let display_name = required(account.display_name, "display_name")?;

        // 16 bytes is the recommended salt length for Argon2.
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash = argon2::hash_encoded(
            account.password.as_bytes(),
            &salt,
            &argon2::Config::default(),
        )?;

        Ok(Self {
            username,
            display_name,
            password_hash,
            rights: account.rights,
        })
    }
}

/// A user's public profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDescription {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub rights: Rights,
}

impl From<User> for UserDescription {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.user.username,
            display_name: user.user.display_name,
            rights: user.user.rights,
        }
    }
}
