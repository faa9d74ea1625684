//! Concurrent chapter download engine.
//!
//! A [`scheduler::Downloader`] accepts chapter URLs, tracks them in a
//! [`queue::QueueManager`] and runs each one as a [`task::DownloadTask`] on a
//! bounded worker pool. Requests go through pooled curl sessions and a
//! per-host rate limiter and circuit breaker.

pub mod circuit_breaker;
pub mod config;
pub mod control;
pub mod host_policy;
pub mod logging;
pub mod plugin;
pub mod queue;
pub mod rate_limit;
pub mod retry;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod task;
pub mod url_model;
