pub mod answer;
pub mod cache;
pub mod config;
pub mod context;
pub mod db;
pub mod decision;
pub mod embeddings;
pub mod error;
pub mod extraction;
pub mod graph;
pub mod llm;
pub mod orchestrator;
pub mod prompts;
pub mod resolution;
pub mod search;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{KgragError, Result};
pub use orchestrator::{HopLoop, SessionOutcome};
