pub mod api;
pub mod commit;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod observability;
pub mod parser;
pub mod proxy;
pub mod registry;
pub mod scheduler;
pub mod storage;

#[cfg(test)]
mod testing;

pub use error::{Result, SyncError};
