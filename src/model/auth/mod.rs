//! Cookie-based authentication.

mod role;
mod token;

pub use role::{Member, Officer, Role};
pub use token::{AuthToken, Caller, AUTH_TOKEN_COOKIE};
