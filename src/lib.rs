#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod crawl;
pub mod enrich;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod frontier;
pub mod logging;
pub mod model;
pub mod openai;
pub mod rate_limit;
pub mod relevance;
