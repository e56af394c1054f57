//! # bdaybot Domain
//!
//! Domain types and models for the birthday relay.
//!
//! This crate contains:
//! - Connection, session and delivery data types
//! - The relay error type and Result alias
//! - Configuration structures
//! - Timing and storage-layout constants
//!
//! ## Architecture
//! - No dependencies on other bdaybot crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
