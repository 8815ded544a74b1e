pub mod api;
pub mod auth;
pub mod common;
pub mod db;
pub mod mongodb;
pub mod store;
