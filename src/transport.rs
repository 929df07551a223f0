use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use tokio_util::sync::CancellationToken;

pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// One fully-prepared outbound attempt, handed to the transport verbatim.
///
/// The engine owns retries, deadlines and header composition; the transport
/// only moves bytes. `cancel` fires when the attempt deadline expires or the
/// caller aborts, and implementations should stop work promptly when it does.
#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub cancel: CancellationToken,
}

#[derive(Clone, Debug)]
pub struct TransportReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TransportReply {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }
}

/// Byte-level request/response backend (an HTTP implementation, a test
/// double, a proxying shim). Any error it returns is classified by the
/// engine as a network failure.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> Result<TransportReply, TransportError>;
}
