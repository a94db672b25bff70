//! Fetcher implementations.
//!
//! - `HttpFetcher` - Fetch `http(s)` sources with reqwest
//! - `MockFetcher` - Canned responses and scripted failures for tests

pub mod http;
pub mod mock;

pub use http::{classify_status, HttpFetcher};
pub use mock::MockFetcher;
