//! Retry and backoff policy shared by page and image requests.
//!
//! Every network operation returns `Result<_, FetchError>`; the error is
//! classified into an `ErrorKind` and `RetryPolicy` decides whether and when
//! to try again. `run_with_retry` drives that loop.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::{reason_phrase, FetchError};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, RetryNotice};
