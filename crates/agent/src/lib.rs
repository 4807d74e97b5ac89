//! Host health monitoring daemon
//!
//! Wires the `vitals-lib` monitor to a background sampler and a small HTTP
//! facade for probes, Prometheus scraping and status queries.

pub mod api;
pub mod config;
