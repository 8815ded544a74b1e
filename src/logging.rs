use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use log::{info, log, warn, Level};
use rocket::{
    fairing::{Fairing, Info, Kind},
    http::{Status, StatusClass},
    Data, Orbit, Request, Response, Rocket,
};

/// Per-request bookkeeping, kept in the request's local cache.
#[derive(Debug)]
pub struct RequestStamp {
    /// Sequential, wrapping.
    pub id: u64,
    received: Instant,
}

impl RequestStamp {
    fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            received: Instant::now(),
        }
    }

    /// The stamp of `req`, created on first use.
    pub fn of<'r>(req: &'r Request<'_>) -> &'r Self {
        req.local_cache(Self::new)
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.received.elapsed().as_millis()
    }
}

/// Failures are louder than successes.
pub fn level_for(status: Status) -> Level {
    match status.class() {
        StatusClass::ServerError => Level::Error,
        StatusClass::ClientError => Level::Warn,
        _ => Level::Info,
    }
}

fn route_label(req: &Request<'_>) -> String {
    match req.route() {
        Some(route) => match route.name {
            Some(ref name) => format!("{name} ({})", route.uri),
            None => route.uri.to_string(),
        },
        None => "UNKNOWN ROUTE".to_string(),
    }
}

/// Logs every request on arrival and every response on departure, with how
/// long the response took.
#[derive(Debug, Copy, Clone)]
pub struct LoggerFairing;

#[rocket::async_trait]
impl Fairing for LoggerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Logger",
            kind: Kind::Liftoff | Kind::Request | Kind::Response | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let config = rocket.config();
        let scheme = if config.tls_enabled() { "https" } else { "http" };
        info!("Serving on {scheme}://{}:{}", config.address, config.port);
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let stamp = RequestStamp::of(req);
        info!("->req{} {} {}", stamp.id, req.method(), req.uri());
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let stamp = RequestStamp::of(req);
        let status = res.status();
        log!(
            level_for(status),
            "<-rsp{} {status} {} in {}ms",
            stamp.id,
            route_label(req),
            stamp.elapsed_ms()
        );
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        warn!("Shutdown requested, stopping gracefully...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_are_numbered_in_order() {
        let first = RequestStamp::new();
        let second = RequestStamp::new();
        assert!(second.id > first.id);
    }

    #[test]
    fn level_follows_status_class() {
        assert_eq!(level_for(Status::Ok), Level::Info);
        assert_eq!(level_for(Status::Conflict), Level::Warn);
        assert_eq!(level_for(Status::ServiceUnavailable), Level::Error);
    }
}
