pub mod config;
pub mod error;
pub mod db;
pub mod graph;
pub mod http;
pub mod models;
pub mod news;
pub mod report;
pub mod retry;
pub mod services;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{NewsgraphError, Result};
pub use graph::{Expansion, Graph, GraphExpander, RelationEdge};
pub use services::Services;
