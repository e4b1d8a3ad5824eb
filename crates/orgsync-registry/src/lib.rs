//! HTTP backend for the source registry.
//!
//! Org units, employees and owner lookups go through the registry's GraphQL
//! endpoint; the organisation and the paginated employee listing use its
//! REST service.

mod client;
mod decode;
mod queries;

pub mod error;

pub use client::RegistryClient;
pub use error::{Error, Result};
