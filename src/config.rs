use std::time::Duration;

/// Hard cap on admitted attempts concurrently in flight, per client. The
/// slot is claimed atomically at admission and held until the transport
/// call completes.
pub const MAX_CONCURRENT_REQUESTS: u32 = 100;

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_CLIENT_NAME: &str = "resilix";

/// Wire protocol posture.
///
/// `Idempotent` adds an `Idempotency-Key` header to every request (generated
/// when the caller supplies none) and, when a body is present, pins its
/// fingerprint in the integrity registry and sends it as `X-Payload-Hash`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProtocolMode {
    #[default]
    Standard,
    Idempotent,
}

/// `Strict` runs response validators after a successful exchange;
/// `Performance` skips validator invocation entirely.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClientMode {
    #[default]
    Strict,
    Performance,
}
