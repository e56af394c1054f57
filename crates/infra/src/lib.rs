//! # bdaybot Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - The linked-device bridge transport (JSON lines over stdio)
//! - Blob store backends (local directory, HTTP object store, memory)
//! - The terminal link presenter
//! - Configuration loading, tracing setup and the cron scheduler
//!
//! ## Architecture
//! - Implements traits defined in `bdaybot-core`
//! - Depends on `bdaybot-common`, `bdaybot-domain` and `bdaybot-core`
//! - Contains all "impure" code (processes, filesystem, HTTP)

pub mod bridge;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod presenter;
pub mod relay;
pub mod scheduling;
pub mod storage;

// Re-export commonly used items
pub use bridge::BridgeTransport;
pub use errors::InfraError;
pub use http::HttpClient;
pub use presenter::TerminalLinkPresenter;
pub use relay::build_relay_service;
pub use scheduling::{RelayScheduler, RelaySchedulerConfig};
pub use storage::{build_blob_store, LocalBlobStore, MemoryBlobStore, ObjectStoreBlobStore};
