use chrono::{DateTime, SubsecRound, Utc};

mod document;
mod rights;

pub use document::{DocumentKind, DocumentStatus};
pub use rights::Rights;

/// Elections are identified by a free-form key chosen by officers, e.g. `"bem-2026"`.
pub type ElectionId = String;

/// The current time, at the millisecond precision the database stores.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
