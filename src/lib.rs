//! `resilix` is a resilient outbound request client: a reusable engine that
//! wraps a pluggable byte-level transport and enforces a deterministic
//! per-request lifecycle, retry/backoff, circuit breaking, in-flight
//! deduplication, bounded concurrency, timeout control, idempotency/payload
//! integrity, response validation and isolated observer hooks.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use resilix::prelude::{Client, RetryPolicy};
//! use serde::Deserialize;
//!
//! # async fn demo(transport: impl resilix::Transport + 'static) -> Result<(), Box<dyn std::error::Error>> {
//! #[derive(Debug, Deserialize)]
//! struct CreateItemResponse {
//!     id: String,
//! }
//!
//! let client = Client::builder(transport)
//!     .base_url("https://api.example.com")
//!     .client_name("my-sdk")
//!     .timeout(Duration::from_secs(3))
//!     .retry_policy(
//!         RetryPolicy::standard()
//!             .max_attempts(3)
//!             .base_delay(Duration::from_millis(100))
//!             .max_delay(Duration::from_millis(800)),
//!     )
//!     .build();
//!
//! let created: CreateItemResponse = client
//!     .post("/v1/items")
//!     .idempotency_key("create-item-001")
//!     .json(&serde_json::json!({ "name": "demo" }))
//!     .send_json()
//!     .await?;
//!
//! println!("created id={}", created.id);
//! # Ok(())
//! # }
//! ```
//!
//! # Recommended Defaults
//!
//! - Use `RetryPolicy::standard()` for SDK traffic.
//! - Set an explicit per-request timeout for latency-sensitive paths.
//! - For retried `POST` traffic, run the client in
//!   [`ProtocolMode::Idempotent`] or set `idempotency_key(...)` per request.

pub(crate) const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
pub(crate) const PAYLOAD_HASH_HEADER: &str = "x-payload-hash";
pub(crate) const REQUEST_ID_HEADER: &str = "x-request-id";

mod breaker;
mod client;
mod config;
mod dedupe;
mod error;
mod hooks;
mod integrity;
mod metrics;
mod response;
mod retry;
mod state;
mod timeout;
mod transport;
mod util;
mod validate;

pub use crate::breaker::{BreakerPolicy, CircuitState};
pub use crate::client::{Client, ClientBuilder, HealthStatus, RequestBuilder, RequestOptions};
pub use crate::config::{ClientMode, MAX_CONCURRENT_REQUESTS, ProtocolMode};
pub use crate::error::{Error, ErrorCode};
pub use crate::hooks::{HookContext, HookFuture, Hooks, ResponseSummary};
pub use crate::metrics::RequestSample;
pub use crate::response::Response;
pub use crate::retry::{BackoffStrategy, CustomBackoff, RetryOn, RetryPolicy};
pub use crate::state::{RequestState, StateMachine};
pub use crate::transport::{Transport, TransportError, TransportReply, TransportRequest};
pub use crate::validate::{ResponseValidator, TypeCheck};

pub type Result<T> = std::result::Result<T, Error>;

pub mod prelude {
    pub use crate::{
        BreakerPolicy, CircuitState, Client, ClientMode, Error, ErrorCode, HealthStatus, Hooks,
        ProtocolMode, Response, Result, RetryOn, RetryPolicy, Transport, TransportReply,
        TransportRequest,
    };
}
