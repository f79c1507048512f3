//! Opponent risk analysis for live chess pages: resolves which scraped
//! identity is the opponent, pulls their public record, and produces a
//! bounded, explainable suspicion score. Page scraping, scheduling, and
//! rendering live outside this crate.

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod identity;
pub mod pipeline;
pub mod pools;
pub mod resolver;
pub mod risk;
pub mod stats;
