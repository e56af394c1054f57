//! HTTP plumbing shared by the network-backed adapters

mod client;

pub use client::{HttpClient, HttpClientBuilder};
