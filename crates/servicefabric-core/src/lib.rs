//! # servicefabric-core
//!
//! Core types and utilities for talking to the Service Fabric cluster management
//! REST API.
//!
//! This crate provides the error type, connection configuration, the HTTP transport
//! capability with its three authentication modes, URL construction and
//! continuation-token pagination shared by the Service Fabric client crates.
//!
//! ## Modules
//!
//! - [`error`] - Error type and HTTP status mapping
//! - [`config`] - Endpoint, API version and authentication configuration
//! - [`client`] - Timeout, connection pool and pagination settings
//! - [`transport`] - HTTP transport capability and the transport configurator
//! - [`ntlm`] - NTLM-negotiated basic authentication
//! - [`query`] - Request URL construction
//! - [`pagination`] - Aggregation of continuation-token pages
//! - [`types`] - Shared enumerations (health state, service kind)
//! - [`ids`] - Strongly-typed identifiers

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod ids;
pub mod ntlm;
pub mod pagination;
pub mod query;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
