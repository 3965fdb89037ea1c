//! Arrow Tower — tourist check-in, route completion and NFT mint pipeline.
//!
//! Module map:
//! - `api` — HTTP surface (check-ins, routes, mint results, admin ops)
//! - `jobs` — completion sweep and the serialized mint worker
//! - `chain` — boundary to the mint relay / contract
//! - `store` — Postgres persistence (sqlx)

use std::sync::Arc;

pub mod api;
pub mod chain;
pub mod cli;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod models;
pub mod seed;
pub mod store;

/// Shared application state passed to handlers and jobs.
pub struct AppState {
    pub db: store::postgres::PgStore,
    pub queue: jobs::mint_worker::MintQueue,
    pub minter: Arc<dyn chain::Minter>,
    pub config: config::Config,
}
