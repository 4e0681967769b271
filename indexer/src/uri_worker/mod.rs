//! SSRF-hardened metadata URI fetcher.
//!
//! A single-owner background queue of `(asset, uri)` tasks, dispatched to
//! a bounded pool of concurrent fetches. Every fetch URL — and every
//! redirect target it follows — passes through [`ssrf::resolve_safe`]
//! before a connection opens; extracted fields are sanitized and written
//! back as `_uri:*`-prefixed metadata entries.

mod sanitize;
mod ssrf;
mod worker;

pub use ssrf::GatewayConfig;
pub use worker::{UriTask, UriWorker, WorkerConfig};
