//! council-harvest - resumable harvesting of council and public-agency
//! bulletin boards.
//!
//! Each configured site is walked page by page through a parser plugin,
//! new postings are enriched from their detail pages and appended to
//! `<code>.jsonl` with a Markdown digest alongside. Progress is
//! checkpointed per page so interrupted runs resume where they stopped.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod plugins;
pub mod repository;
pub mod scrapers;
pub mod storage;
pub mod utils;

pub use error::{HarvestError, Result};
