//! govm Mining Client
//!
//! An async proof-of-work mining client for the govm multi-chain network:
//! - Streaming block templates over websocket with supervised reconnection
//! - Multi-threaded CPU nonce search with batched signing
//! - Work preemption on template replacement, per chain
//! - Sliding-window hash-rate and confirmation accounting

pub mod config;
pub mod crypto;
pub mod error;
pub mod feed;
pub mod pow;
pub mod stats;
pub mod store;
pub mod submit;
pub mod types;
pub mod wallet;
pub mod worker;

pub use config::{Cli, Config};
pub use error::{Error, Result};
pub use types::*;

/// Application information
pub const APP_NAME: &str = "govm-mining-client";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
