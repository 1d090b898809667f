//! HTTP API module for the Bookshelf backend.
//!
//! `ApiClient` is the single choke point for all outgoing calls: it resolves
//! the effective host, attaches the bearer credential, enforces the request
//! timeout, and applies the universal 401 sign-out on the way back in.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
