//! Reusable HTTP client sessions.
//!
//! A session wraps one curl easy handle, so consecutive requests reuse its
//! connection cache, DNS cache and cookie engine. Sessions are handed out by
//! [`SessionPool`] and owned by exactly one thread between acquire and release.

mod client;
mod pool;

pub use client::{HttpSession, Response, SessionSettings};
pub use pool::{PoolError, PoolStats, PooledSession, SessionPool};
