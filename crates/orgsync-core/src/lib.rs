//! Core types and trait definitions for the organisation export.
//!
//! This crate is deliberately free of HTTP dependencies. It holds the record
//! types read from the registry, the entity shapes posted to the directory
//! service, and the pure decision logic in between: relevance, field mapping,
//! identity substitution and string hygiene.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod directory;
pub mod error;
pub mod identity;
pub mod mapping;
pub mod registry;
pub mod relevance;
pub mod sanitize;
pub mod settings;
pub mod source;
pub mod target;
pub mod template;

pub use error::{Error, Result, Transient};
pub use settings::Settings;
