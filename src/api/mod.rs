use rocket::{http::Status, serde::json::Json, Catcher, Request, Route};

use crate::error::ErrorBody;

mod auth;
mod documents;
mod elections;
mod users;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(users::routes());
    routes.extend(elections::routes());
    routes.extend(documents::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![error_body]
}

/// Give errors raised outside a route (failed guards, unmatched paths,
/// malformed bodies) the same JSON shape as errors a route returns.
#[catch(default)]
fn error_body(status: Status, _req: &Request) -> (Status, Json<ErrorBody>) {
    let error = match status.code {
        401 => "Not signed in".to_string(),
        403 => "Insufficient rights".to_string(),
        404 => "Not found".to_string(),
        422 => "Malformed request body".to_string(),
        _ => status.reason().unwrap_or("Unknown error").to_string(),
    };
    (status, Json(ErrorBody { error }))
}
