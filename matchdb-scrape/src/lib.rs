//! Source adapters and the polite-fetching layer for the scraper engine.
//!
//! This crate knows how to talk to schedule sites and how to read their
//! pages. It never touches the database: adapters are declarative config
//! plus pure parsing hooks, the fetcher is an HTTP client with the retry
//! and rate-limit policy applied, and the checkpoint file is the only thing
//! here that touches disk. The engine that drives a whole run lives in
//! `matchdb-pipeline`.

pub mod adapter;
pub mod adapters;
pub mod checkpoint;
pub mod fetch;
pub mod html;
pub mod stats;

pub use adapter::{
    Adapter, ColumnMap, DataPolicy, DiscoveredEvent, DiscoverySpec, Endpoints, EventKind,
    MatchStatus, ParsedMatch, RatePolicy, ScrapePlan, StaticEvent, Technology, render_match_key,
};
pub use checkpoint::Checkpoint;
pub use fetch::{Fetch, FetchError, Fetcher};
pub use stats::RunStats;
