//! HTTP transport for Stampede
//!
//! Virtual users talk to the target service through the [`HttpClient`]
//! trait. [`HttpManager`] is the reqwest-backed implementation; each
//! virtual user owns one so that connection pools and headers are never
//! shared between users. With the `testing` feature a scripted
//! [`mock::MockHttpClient`] is available as well.

pub mod client;
pub mod config;
pub mod errors;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod mock;

// Re-export main types for convenience
pub use client::{HttpClient, HttpManager, HttpRequest, HttpResponse};
pub use config::HttpConfig;
pub use errors::HttpError;
pub use types::HttpMethod;
