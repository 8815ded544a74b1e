use std::io::Error as IoError;

use argon2::Error as Argon2Error;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use log::{error, warn};
use mongodb::error::{Error as DbError, ErrorKind as DbErrorKind};
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::{serde_json::Error as JsonError, Json},
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::logging::RequestStamp;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error("Cache snapshot I/O failed: {0}")]
    Io(#[from] IoError),
    #[error("Cache snapshot is malformed: {0}")]
    Json(#[from] JsonError),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    pub fn not_found(what: impl AsRef<str>) -> Self {
        Self::Status(Status::NotFound, format!("{} not found", what.as_ref()))
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::Status(Status::BadRequest, msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Status(Status::Conflict, msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Status(Status::Forbidden, msg.into())
    }

    /// Was the remote store unreachable, as opposed to rejecting the request?
    /// Reads that fail this way can be served from the cache mirror.
    pub fn is_store_failure(&self) -> bool {
        match self {
            Self::Db(err) => is_connectivity_error(err),
            Self::Unavailable(_) => true,
            _ => false,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::Argon2(_) | Self::Io(_) | Self::Json(_) => {
                Status::InternalServerError
            }
            Self::Unavailable(_) => Status::ServiceUnavailable,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::Status(status, _) => *status,
        }
    }

    /// The message shown to the client. Internal details stay in the logs.
    fn user_message(&self) -> String {
        match self {
            Self::Db(_) | Self::Argon2(_) | Self::Io(_) | Self::Json(_) => {
                "Internal server error".to_string()
            }
            Self::Unavailable(_) => "Service temporarily unavailable, try again later".to_string(),
            Self::Jwt(_) => "Invalid authentication token".to_string(),
            Self::Status(_, msg) => msg.clone(),
        }
    }
}

/// Lost connections, as opposed to errors the database reported or data it
/// returned that did not fit.
fn is_connectivity_error(err: &DbError) -> bool {
    matches!(
        *err.kind,
        DbErrorKind::ServerSelection { .. }
            | DbErrorKind::Io(_)
            | DbErrorKind::ConnectionPoolCleared { .. }
    )
}

/// JSON body attached to every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let id = RequestStamp::of(req).id;
        if status.code >= 500 {
            error!("rsp{id} failed: {self}");
        } else {
            warn!("rsp{id} refused: {self}");
        }
        let body = Json(ErrorBody {
            error: self.user_message(),
        });
        (status, body).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind as IoErrorKind;

    use mongodb::bson::{from_bson, Bson};

    use super::*;

    #[test]
    fn lost_connection_is_a_store_failure() {
        let lost = IoError::new(IoErrorKind::ConnectionRefused, "connection refused");
        let err = Error::Db(DbError::from(lost));
        assert!(err.is_store_failure());
        assert!(Error::Unavailable("offline".into()).is_store_failure());
    }

    #[test]
    fn malformed_data_is_not_a_store_failure() {
        let bad = from_bson::<u32>(Bson::String("seven".into())).unwrap_err();
        let err = Error::Db(DbError::from(bad));
        assert!(!err.is_store_failure());
        assert_eq!(err.status(), Status::InternalServerError);
    }

    #[test]
    fn request_errors_are_not_store_failures() {
        assert!(!Error::conflict("taken").is_store_failure());
        assert!(!Error::not_found("Document").is_store_failure());
    }
}
