use std::{path::PathBuf, sync::Arc};

use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_sns::{
    config::{Credentials, Region},
    Client as SnsClient,
};
use chrono::Duration;
use log::{error, info, warn};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Orbit, Rocket,
};
use serde::Deserialize;

use crate::model::{
    api::NewAccount,
    common::Rights,
    mongodb::{ensure_indexes_exist, MongoStore},
    store::{ensure_officer_exists, MemoryStore, Repo},
};
use crate::notify::Notifier;

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

#[cfg(test)]
impl Config {
    pub fn example() -> Self {
        Self::with_secret("test-jwt-secret")
    }

    pub fn with_secret(secret: &str) -> Self {
        Self {
            auth_ttl: 3600,
            jwt_secret: secret.to_string(),
        }
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Credentials for the officer created when the database has none.
#[derive(Deserialize)]
struct BootstrapOfficer {
    username: String,
    password: String,
    display_name: String,
}

impl From<BootstrapOfficer> for NewAccount {
    fn from(officer: BootstrapOfficer) -> Self {
        Self {
            username: officer.username,
            password: officer.password,
            display_name: officer.display_name,
            rights: Rights::Officer,
        }
    }
}

/// Configuration for the database and its local mirror.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    #[serde(default = "default_db_name")]
    db_name: String,
    #[serde(default)]
    cache_snapshot: Option<PathBuf>,
    // secrets
    db_uri: String,
    #[serde(default)]
    bootstrap_officer: Option<BootstrapOfficer>,
}

fn default_db_name() -> String {
    "orgdesk".to_string()
}

/// Load the local tables from the snapshot, if there is one. A snapshot that
/// cannot be read only costs the offline copy, so the server starts empty.
fn load_local_tables(snapshot: Option<&PathBuf>) -> MemoryStore {
    let Some(path) = snapshot else {
        return MemoryStore::new();
    };
    match MemoryStore::load_snapshot(path) {
        Ok(local) => {
            info!("Loaded cache snapshot from {}", path.display());
            local
        }
        Err(e) => {
            warn!("Ignoring cache snapshot {}: {e}", path.display());
            MemoryStore::new()
        }
    }
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places the mirrored [`Repo`] into
/// managed state. On shutdown the local tables are written back to the
/// snapshot file.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite | Kind::Shutdown,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(&config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&config.db_name);

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }

        let local = load_local_tables(config.cache_snapshot.as_ref());
        let repo = Repo::new(Arc::new(MongoStore::new(client, db)), local);

        // Ensure there is at least one officer.
        let bootstrap = config.bootstrap_officer.map(NewAccount::from);
        if let Err(e) = ensure_officer_exists(&*repo, bootstrap).await {
            error!("Failed to prepare database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(repo);
        Ok(rocket)
    }

    async fn on_shutdown(&self, rocket: &Rocket<Orbit>) {
        let Ok(path) = rocket.figment().extract_inner::<PathBuf>("cache_snapshot") else {
            return;
        };
        let Some(repo) = rocket.state::<Repo>() else {
            return;
        };
        match repo.local().save_snapshot(&path) {
            Ok(()) => info!("Saved cache snapshot to {}", path.display()),
            Err(e) => error!("Failed to save cache snapshot to {}: {e}", path.display()),
        }
    }
}

/// Configuration for the notification topic.
#[derive(Deserialize)]
struct NotificationConfig {
    // non-secrets
    aws_region: String,
    aws_access_key_id: String,
    topic_arn: String,
    // secrets
    aws_secret_access_key: String,
}

/// A fairing that loads the optional `notifications` config and places a
/// [`Notifier`] into managed state. Without the config, notifications are
/// disabled.
pub struct NotificationFairing;

#[rocket::async_trait]
impl Fairing for NotificationFairing {
    fn info(&self) -> Info {
        Info {
            name: "AWS SNS",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        if !rocket.figment().contains("notifications") {
            info!("No notification config, notifications disabled");
            rocket = rocket.manage(Notifier::disabled());
            return Ok(rocket);
        }

        // Load the config.
        let config = match rocket
            .figment()
            .extract_inner::<NotificationConfig>("notifications")
        {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load notification config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        // Construct the connection.
        let aws_config = SdkConfig::builder()
            .region(Region::new(config.aws_region))
            .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
                config.aws_access_key_id,
                config.aws_secret_access_key,
                None,
                None,
                "rocket config",
            )))
            .behavior_version(BehaviorVersion::latest())
            .build();
        let client = SnsClient::new(&aws_config);
        info!("Loaded Amazon SNS config, publishing to {}", config.topic_arn);

        // Manage the state.
        rocket = rocket.manage(Notifier::sns(client, config.topic_arn));
        Ok(rocket)
    }
}
