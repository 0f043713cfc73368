#![doc = "The `taskhub` library crate."]
#![doc = ""]
#![doc = "Domain models, query parsing, session authentication, persistence, analytics"]
#![doc = "and routing for the taskhub API. The binary (`main.rs`) wires these into an"]
#![doc = "`HttpServer`; the integration tests build the same app against `MemoryStore`."]

pub mod analytics;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod query;
pub mod routes;
pub mod security;
pub mod store;

pub use crate::config::Config;
pub use crate::error::AppError;
