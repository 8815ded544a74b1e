#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use std::sync::Arc;

use rocket::{figment::Figment, Build, Rocket};

use crate::config::{ConfigFairing, DatabaseFairing, NotificationFairing};
use crate::logging::LoggerFairing;
use crate::model::store::{MemoryStore, Repo, Store};
use crate::notify::Notifier;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod notify;

/// Routes, catchers and the fairings every server carries.
fn base(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
}

/// The production server: connects to MongoDB and Amazon SNS as configured.
pub fn build() -> Rocket<Build> {
    base(rocket::build())
        .attach(DatabaseFairing)
        .attach(NotificationFairing)
}

/// A server over an already-open remote store, mirrored into fresh local
/// tables, with notifications disabled.
pub fn rocket_for_store(remote: Arc<dyn Store>, figment: Figment) -> Rocket<Build> {
    base(rocket::custom(figment))
        .manage(Repo::new(remote, MemoryStore::new()))
        .manage(Notifier::disabled())
}

/// Configuration for test servers.
#[cfg(test)]
pub(crate) fn test_figment() -> Figment {
    rocket::Config::figment()
        .merge(("jwt_secret", "test-jwt-secret"))
        .merge(("auth_ttl", 3600))
        .merge(("log_level", "off"))
}
