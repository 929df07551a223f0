use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

use crate::breaker::{BreakerPolicy, CircuitBreaker, CircuitState};
use crate::config::{
    ClientMode, DEFAULT_CLIENT_NAME, DEFAULT_TIMEOUT, MAX_CONCURRENT_REQUESTS, ProtocolMode,
};
use crate::dedupe::{DedupeClaim, DedupeMap, await_shared, dedupe_applies, dedupe_key};
use crate::error::Error;
use crate::hooks::{HookContext, HookRunner, Hooks, ResponseSummary};
use crate::integrity::{IntegrityRegistry, fingerprint};
use crate::metrics::{MetricsBuffer, RECENT_FAILURE_WINDOW, RequestSample};
use crate::response::Response;
use crate::retry::RetryPolicy;
use crate::state::{RequestState, StateMachine};
use crate::timeout::{DeadlineOutcome, run_with_deadline};
use crate::transport::{Transport, TransportReply, TransportRequest};
use crate::util::{generate_idempotency_key, generate_request_id, merge_headers, resolve_url};
use crate::validate::ResponseValidator;
use crate::{IDEMPOTENCY_KEY_HEADER, PAYLOAD_HASH_HEADER, REQUEST_ID_HEADER};

/// One outbound call: target, payload and per-call overrides.
pub struct RequestOptions {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
    pub headers: HeaderMap,
    pub validator: Option<Arc<dyn ResponseValidator>>,
    pub cancel: Option<CancellationToken>,
    pub idempotency_key: Option<String>,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            headers: HeaderMap::new(),
            validator: None,
            cancel: None,
            idempotency_key: None,
            timeout: None,
        }
    }
}

impl std::fmt::Debug for RequestOptions {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RequestOptions")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("has_body", &self.body.is_some())
            .field("has_validator", &self.validator.is_some())
            .field("idempotency_key", &self.idempotency_key)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Point-in-time client health view.
#[derive(Clone, Copy, Debug)]
pub struct HealthStatus {
    pub circuit_state: CircuitState,
    /// Breaker failures in the current closed/half-open epoch (cleared by any
    /// success). The metrics window view is available separately through
    /// [`Client::recent_failure_count`].
    pub recent_failures: u32,
    pub average_latency_ms: f64,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    base_url: String,
    client_name: String,
    timeout: Duration,
    default_headers: HeaderMap,
    retry_policy: RetryPolicy,
    breaker: CircuitBreaker,
    dedupe_enabled: bool,
    dedupe: DedupeMap,
    protocol_mode: ProtocolMode,
    client_mode: ClientMode,
    integrity: IntegrityRegistry,
    metrics: MetricsBuffer,
    hooks: HookRunner,
    in_flight: AtomicU32,
}

/// Resilient request client around a pluggable [`Transport`].
///
/// Cheap to clone; all resilience state (circuit breaker, dedup map,
/// integrity registry, metrics) is shared between clones.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

pub struct ClientBuilder {
    transport: Arc<dyn Transport>,
    base_url: String,
    client_name: String,
    timeout: Duration,
    default_headers: HeaderMap,
    retry_policy: RetryPolicy,
    breaker_policy: BreakerPolicy,
    dedupe: bool,
    protocol_mode: ProtocolMode,
    client_mode: ClientMode,
}

impl ClientBuilder {
    fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            base_url: String::new(),
            client_name: DEFAULT_CLIENT_NAME.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            default_headers: HeaderMap::new(),
            retry_policy: RetryPolicy::standard(),
            breaker_policy: BreakerPolicy::standard(),
            dedupe: false,
            protocol_mode: ProtocolMode::Standard,
            client_mode: ClientMode::Strict,
        }
    }

    /// Prefix for relative request URLs. Concatenated verbatim, so carry the
    /// trailing shape you want (`https://api.test` + `/v1/users`).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn client_name(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = client_name.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.max(Duration::from_millis(1));
        self
    }

    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn breaker_policy(mut self, breaker_policy: BreakerPolicy) -> Self {
        self.breaker_policy = breaker_policy;
        self
    }

    /// Share a single in-flight result between identical concurrent GET/HEAD
    /// calls. Only effective while `retry_policy.max_attempts <= 1`; enabling
    /// retries disables dedup so waiters never share a retry lifecycle.
    pub fn dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }

    pub fn protocol_mode(mut self, protocol_mode: ProtocolMode) -> Self {
        self.protocol_mode = protocol_mode;
        self
    }

    pub fn client_mode(mut self, client_mode: ClientMode) -> Self {
        self.client_mode = client_mode;
        self
    }

    pub fn build(self) -> Client {
        Client {
            inner: Arc::new(ClientInner {
                transport: self.transport,
                base_url: self.base_url,
                client_name: self.client_name,
                timeout: self.timeout,
                default_headers: self.default_headers,
                retry_policy: self.retry_policy,
                breaker: CircuitBreaker::new(self.breaker_policy),
                dedupe_enabled: self.dedupe,
                dedupe: DedupeMap::new(),
                protocol_mode: self.protocol_mode,
                client_mode: self.client_mode,
                integrity: IntegrityRegistry::new(),
                metrics: MetricsBuffer::new(),
                hooks: HookRunner::new(),
                in_flight: AtomicU32::new(0),
            }),
        }
    }
}

impl Client {
    pub fn builder(transport: impl Transport + 'static) -> ClientBuilder {
        ClientBuilder::new(Arc::new(transport))
    }

    pub fn builder_with(transport: Arc<dyn Transport>) -> ClientBuilder {
        ClientBuilder::new(transport)
    }

    pub fn get(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::GET, url.into())
    }

    pub fn head(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::HEAD, url.into())
    }

    pub fn post(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::POST, url.into())
    }

    pub fn put(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::PUT, url.into())
    }

    pub fn patch(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::PATCH, url.into())
    }

    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::DELETE, url.into())
    }

    pub fn options(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::OPTIONS, url.into())
    }

    /// Merge an observer table into the client. Later merges win per key;
    /// in-flight requests pick the change up on their next hook firing.
    pub fn use_hooks(&self, hooks: Hooks) -> &Self {
        self.inner.hooks.merge(hooks);
        self
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            circuit_state: self.inner.breaker.state(),
            recent_failures: self.inner.breaker.failures(),
            average_latency_ms: self.inner.metrics.average_latency_ms(),
        }
    }

    /// Failed samples within the trailing 60-second metrics window; the
    /// sample-log counterpart of [`HealthStatus::recent_failures`].
    pub fn recent_failure_count(&self) -> usize {
        self.inner.metrics.recent_failures(RECENT_FAILURE_WINDOW)
    }

    /// Copy of the resident request samples, oldest first (at most 1000).
    pub fn recent_samples(&self) -> Vec<RequestSample> {
        self.inner.metrics.samples_snapshot()
    }

    /// Execute one logical request through the full pipeline: dedup gate,
    /// lifecycle state machine, circuit breaker, retry loop, deadline
    /// harness, idempotency enforcement, validation and hooks.
    pub async fn request(&self, options: RequestOptions) -> Result<Response, Error> {
        let inner = &self.inner;
        let url = resolve_url(&inner.base_url, &options.url);
        let request_id = generate_request_id();
        let effective_timeout = options.timeout.unwrap_or(inner.timeout);
        let max_attempts = inner.retry_policy.max_attempts_value();

        if dedupe_applies(inner.dedupe_enabled, &options.method, max_attempts) {
            let key = dedupe_key(&options.method, &url, &fingerprint(options.body.as_ref()));
            match inner.dedupe.claim(&key) {
                DedupeClaim::Follower(receiver) => {
                    debug!(url = %url, "joining identical in-flight request");
                    return await_shared(receiver).await;
                }
                DedupeClaim::Leader(lease) => {
                    let outcome = self
                        .drive(options, url, request_id, effective_timeout)
                        .await;
                    inner.dedupe.settle(lease, outcome.clone());
                    return outcome;
                }
            }
        }

        self.drive(options, url, request_id, effective_timeout).await
    }

    async fn drive(
        &self,
        options: RequestOptions,
        url: String,
        request_id: String,
        effective_timeout: Duration,
    ) -> Result<Response, Error> {
        let inner = &self.inner;
        let mut machine = StateMachine::new();
        let external = options.cancel.clone().unwrap_or_default();
        let mut context = HookContext {
            method: options.method.clone(),
            url: url.clone(),
            attempt: 0,
            request_id: request_id.clone(),
        };

        if external.is_cancelled() {
            machine.transition(RequestState::Cancelled)?;
            inner.hooks.cancel(&context).await;
            return Err(cancelled_error(effective_timeout, &options.method, &url));
        }

        machine.transition(RequestState::Pending)?;

        // The key pins the body fingerprint across every retry of this call.
        let idempotency_key = match inner.protocol_mode {
            ProtocolMode::Idempotent => Some(
                options
                    .idempotency_key
                    .clone()
                    .unwrap_or_else(generate_idempotency_key),
            ),
            ProtocolMode::Standard => None,
        };

        let base_headers = match self.compose_headers(&options, &request_id) {
            Ok(headers) => headers,
            Err(error) => {
                machine.transition(RequestState::Error)?;
                inner.hooks.error(&context, &error).await;
                return Err(error);
            }
        };
        let idempotency_header = match &idempotency_key {
            Some(key) => match header_value(key) {
                Ok(value) => Some(value),
                Err(error) => {
                    machine.transition(RequestState::Error)?;
                    inner.hooks.error(&context, &error).await;
                    return Err(error);
                }
            },
            None => None,
        };
        let body_bytes = match serialize_body(&options) {
            Ok(body) => body,
            Err(error) => {
                machine.transition(RequestState::Error)?;
                inner.hooks.error(&context, &error).await;
                return Err(error);
            }
        };

        let max_attempts = inner.retry_policy.max_attempts_value();
        let mut last_error: Option<Error> = None;

        for attempt in 1..=max_attempts {
            context.attempt = attempt;

            // Admission claims the slot in one atomic step; a bare check
            // followed by a later increment would let concurrent attempts
            // race past the cap between the two.
            let Some(flight) = FlightGuard::try_enter(&inner.in_flight) else {
                let error = Error::network("Max concurrent requests exceeded");
                machine.transition(RequestState::Error)?;
                inner.hooks.error(&context, &error).await;
                return Err(error);
            };

            if inner.breaker.check().is_err() {
                warn!(method = %context.method, url = %url, "circuit breaker rejected attempt");
                let error = Error::CircuitOpen {
                    method: options.method.clone(),
                    url: url.clone(),
                };
                inner.hooks.circuit_open(&context).await;
                machine.transition(RequestState::Error)?;
                return Err(error);
            }

            inner.hooks.before_request(&context).await;

            let attempt_cancel = external.child_token();

            let mut headers = base_headers.clone();
            if let Some(key) = &idempotency_key {
                if let Some(value) = &idempotency_header {
                    headers.insert(IDEMPOTENCY_KEY_HEADER, value.clone());
                }
                if let Some(body) = &options.body {
                    let digest = match inner.integrity.enforce(key, Some(body)) {
                        Ok(digest) => digest,
                        Err(error) => {
                            machine.transition(RequestState::Error)?;
                            inner.hooks.error(&context, &error).await;
                            return Err(error);
                        }
                    };
                    match header_value(&digest) {
                        Ok(value) => headers.insert(PAYLOAD_HASH_HEADER, value),
                        Err(error) => {
                            machine.transition(RequestState::Error)?;
                            inner.hooks.error(&context, &error).await;
                            return Err(error);
                        }
                    };
                }
            }

            let span = info_span!(
                "resilix.request",
                client = %inner.client_name,
                method = %context.method,
                url = %url,
                attempt = attempt,
                max_attempts = max_attempts
            );
            span.in_scope(|| debug!("sending request"));

            let started = Instant::now();
            let transport_request = TransportRequest {
                method: options.method.clone(),
                url: url.clone(),
                headers,
                body: body_bytes.clone(),
                cancel: attempt_cancel.clone(),
            };
            let outcome = run_with_deadline(
                inner.transport.execute(transport_request),
                effective_timeout,
                &attempt_cancel,
            )
            .instrument(span.clone())
            .await;
            drop(flight);
            let latency_ms = started.elapsed().as_millis() as u64;

            match outcome {
                DeadlineOutcome::Completed(Ok(reply)) if is_success(&reply) => {
                    let mut payload = match decode_body(&reply) {
                        Ok(payload) => payload,
                        Err(error) => {
                            // Post-success client decision: never feeds the
                            // breaker and never retries.
                            machine.transition(RequestState::Error)?;
                            inner.hooks.error(&context, &error).await;
                            return Err(error);
                        }
                    };

                    if inner.client_mode == ClientMode::Strict
                        && let Some(validator) = &options.validator
                    {
                        match validator.parse(&payload) {
                            Ok(refined) => payload = refined,
                            Err(issues) => {
                                let error = Error::ResponseValidation {
                                    message: format!(
                                        "response for {} {} failed validation",
                                        context.method, url
                                    ),
                                    issues,
                                };
                                machine.transition(RequestState::Error)?;
                                inner.hooks.error(&context, &error).await;
                                return Err(error);
                            }
                        }
                    }

                    inner.breaker.record_success();
                    machine.transition(RequestState::Success)?;
                    let status = reply.status;
                    let response = Response::new(
                        payload,
                        status,
                        reply.headers,
                        request_id.clone(),
                        attempt,
                        latency_ms,
                    );
                    inner.metrics.record(RequestSample::new(
                        request_id.clone(),
                        url.clone(),
                        options.method.clone(),
                        latency_ms,
                        attempt,
                        Some(status.as_u16()),
                        true,
                    ));
                    span.in_scope(|| debug!(status = status.as_u16(), latency_ms, "request succeeded"));
                    inner
                        .hooks
                        .after_response(
                            &context,
                            ResponseSummary {
                                status,
                                attempt,
                                latency_ms,
                            },
                        )
                        .await;
                    return Ok(response);
                }
                DeadlineOutcome::Completed(Ok(reply)) => {
                    let status = reply.status.as_u16();
                    inner.breaker.record_failure();
                    inner.metrics.record(RequestSample::new(
                        request_id.clone(),
                        url.clone(),
                        options.method.clone(),
                        latency_ms,
                        attempt,
                        Some(status),
                        false,
                    ));
                    let error = Error::network(format!("HTTP {status}"));
                    span.in_scope(|| warn!(status, attempt, "request attempt failed"));
                    last_error = Some(error.clone());
                    if inner.retry_policy.should_retry(Some(status), attempt) {
                        machine.transition(RequestState::Retrying)?;
                        inner.hooks.retry(&context, &error).await;
                        if !self.backoff_sleep(attempt, &external).await {
                            machine.transition(RequestState::Cancelled)?;
                            inner.hooks.cancel(&context).await;
                            return Err(cancelled_error(
                                effective_timeout,
                                &options.method,
                                &url,
                            ));
                        }
                        machine.transition(RequestState::Pending)?;
                        continue;
                    }
                    break;
                }
                DeadlineOutcome::Elapsed | DeadlineOutcome::Interrupted => {
                    let error = Error::Timeout {
                        timeout_ms: effective_timeout.as_millis() as u64,
                        method: options.method.clone(),
                        url: url.clone(),
                    };
                    // The caller's own abort wins even when the deadline
                    // fired in the same tick.
                    if external.is_cancelled() {
                        machine.transition(RequestState::Cancelled)?;
                        inner.hooks.cancel(&context).await;
                        return Err(error);
                    }
                    inner.breaker.record_failure();
                    inner.metrics.record(RequestSample::new(
                        request_id.clone(),
                        url.clone(),
                        options.method.clone(),
                        latency_ms,
                        attempt,
                        None,
                        false,
                    ));
                    span.in_scope(|| {
                        warn!(timeout_ms = effective_timeout.as_millis() as u64, attempt, "attempt timed out");
                    });
                    if inner.retry_policy.should_retry(None, attempt) {
                        last_error = Some(error.clone());
                        machine.transition(RequestState::Retrying)?;
                        inner.hooks.retry(&context, &error).await;
                        if !self.backoff_sleep(attempt, &external).await {
                            machine.transition(RequestState::Cancelled)?;
                            inner.hooks.cancel(&context).await;
                            return Err(cancelled_error(
                                effective_timeout,
                                &options.method,
                                &url,
                            ));
                        }
                        machine.transition(RequestState::Pending)?;
                        continue;
                    }
                    machine.transition(RequestState::Error)?;
                    inner.hooks.error(&context, &error).await;
                    return Err(error);
                }
                DeadlineOutcome::Completed(Err(source)) => {
                    if external.is_cancelled() {
                        machine.transition(RequestState::Cancelled)?;
                        inner.hooks.cancel(&context).await;
                        return Err(cancelled_error(effective_timeout, &options.method, &url));
                    }
                    inner.breaker.record_failure();
                    inner.metrics.record(RequestSample::new(
                        request_id.clone(),
                        url.clone(),
                        options.method.clone(),
                        latency_ms,
                        attempt,
                        None,
                        false,
                    ));
                    let error = Error::network_caused(
                        format!("transport error: {source}"),
                        Arc::from(source),
                    );
                    span.in_scope(|| warn!(attempt, "transport attempt failed: {error}"));
                    if inner.retry_policy.should_retry(None, attempt) {
                        last_error = Some(error.clone());
                        machine.transition(RequestState::Retrying)?;
                        inner.hooks.retry(&context, &error).await;
                        if !self.backoff_sleep(attempt, &external).await {
                            machine.transition(RequestState::Cancelled)?;
                            inner.hooks.cancel(&context).await;
                            return Err(cancelled_error(
                                effective_timeout,
                                &options.method,
                                &url,
                            ));
                        }
                        machine.transition(RequestState::Pending)?;
                        continue;
                    }
                    machine.transition(RequestState::Error)?;
                    inner.hooks.error(&context, &error).await;
                    return Err(error);
                }
            }
        }

        // Non-retryable non-2xx, or the retry budget ran dry.
        machine.transition(RequestState::Error)?;
        let underlying = last_error.unwrap_or_else(|| Error::network("Request failed"));
        let error = if max_attempts <= 1 {
            underlying
        } else {
            Error::RetryExhausted {
                attempts: max_attempts,
                last_error: Box::new(underlying),
            }
        };
        inner.hooks.error(&context, &error).await;
        Err(error)
    }

    fn compose_headers(
        &self,
        options: &RequestOptions,
        request_id: &str,
    ) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(REQUEST_ID_HEADER, header_value(request_id)?);
        merge_headers(&mut headers, &self.inner.default_headers);
        merge_headers(&mut headers, &options.headers);
        Ok(headers)
    }

    /// Cancellable backoff. Returns false when the caller aborted mid-sleep,
    /// in which case no further attempt may start.
    async fn backoff_sleep(&self, attempt: u32, external: &CancellationToken) -> bool {
        let delay = self.inner.retry_policy.compute_delay(attempt);
        debug!(delay_ms = delay.as_millis() as u64, attempt, "backing off before retry");
        tokio::select! {
            _ = external.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Client")
            .field("client_name", &self.inner.client_name)
            .field("base_url", &self.inner.base_url)
            .field("protocol_mode", &self.inner.protocol_mode)
            .field("client_mode", &self.inner.client_mode)
            .finish_non_exhaustive()
    }
}

/// Occupied in-flight slot; releasing is the drop.
struct FlightGuard<'a> {
    counter: &'a AtomicU32,
}

impl<'a> FlightGuard<'a> {
    /// Test-and-increment as a single atomic operation: the slot is claimed
    /// only while the counter is below the cap.
    fn try_enter(counter: &'a AtomicU32) -> Option<Self> {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < MAX_CONCURRENT_REQUESTS).then_some(current + 1)
            })
            .ok()
            .map(|_| Self { counter })
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

fn is_success(reply: &TransportReply) -> bool {
    // 2xx-3xx counts as success; redirects are not followed.
    let status = reply.status.as_u16();
    (200..400).contains(&status)
}

fn decode_body(reply: &TransportReply) -> Result<Value, Error> {
    if reply.body.is_empty() {
        return Ok(Value::Null);
    }
    let is_json = reply
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("application/json"));
    if is_json {
        serde_json::from_slice(&reply.body).map_err(|source| {
            Error::network_caused("failed to decode response body as json", Arc::new(source))
        })
    } else {
        Ok(Value::String(
            String::from_utf8_lossy(&reply.body).into_owned(),
        ))
    }
}

fn serialize_body(options: &RequestOptions) -> Result<Option<Bytes>, Error> {
    let Some(body) = &options.body else {
        return Ok(None);
    };
    if options.method == Method::GET || options.method == Method::HEAD {
        return Ok(None);
    }
    let raw = serde_json::to_vec(body).map_err(|source| {
        Error::network_caused("failed to serialize request body", Arc::new(source))
    })?;
    Ok(Some(Bytes::from(raw)))
}

fn header_value(text: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(text)
        .map_err(|_| Error::network(format!("invalid header value: {text:?}")))
}

fn cancelled_error(effective_timeout: Duration, method: &Method, url: &str) -> Error {
    Error::Timeout {
        timeout_ms: effective_timeout.as_millis() as u64,
        method: method.clone(),
        url: url.to_owned(),
    }
}

/// Fluent request construction, ending in [`RequestBuilder::send`].
pub struct RequestBuilder<'a> {
    client: &'a Client,
    options: RequestOptions,
    deferred_error: Option<Error>,
}

impl<'a> RequestBuilder<'a> {
    fn new(client: &'a Client, method: Method, url: String) -> Self {
        Self {
            client,
            options: RequestOptions::new(method, url),
            deferred_error: None,
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.options.headers.insert(name, value);
        self
    }

    pub fn try_header(mut self, name: &str, value: &str) -> Result<Self, Error> {
        let name: HeaderName = name
            .parse()
            .map_err(|_| Error::network(format!("invalid header name: {name:?}")))?;
        let value = header_value(value)?;
        self.options.headers.insert(name, value);
        Ok(self)
    }

    /// JSON body. Serialization happens at send time; a value that cannot be
    /// represented as JSON fails the send.
    pub fn json<T>(mut self, body: &T) -> Self
    where
        T: Serialize + ?Sized,
    {
        match serde_json::to_value(body) {
            Ok(value) => self.options.body = Some(value),
            Err(source) => {
                self.deferred_error = Some(Error::network_caused(
                    "failed to serialize request body",
                    Arc::new(source),
                ));
            }
        }
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.options.body = Some(body);
        self
    }

    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.options.idempotency_key = Some(key.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout.max(Duration::from_millis(1)));
        self
    }

    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.options.cancel = Some(cancel);
        self
    }

    pub fn validator(mut self, validator: Arc<dyn ResponseValidator>) -> Self {
        self.options.validator = Some(validator);
        self
    }

    pub async fn send(self) -> Result<Response, Error> {
        if let Some(error) = self.deferred_error {
            return Err(error);
        }
        self.client.request(self.options).await
    }

    pub async fn send_json<T>(self) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let response = self.send().await?;
        response.json()
    }
}
