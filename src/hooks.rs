use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use http::{Method, StatusCode};

use crate::error::Error;
use crate::util::lock_unpoisoned;

pub type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Observer view of one call: stable for the whole request apart from
/// `attempt`, which tracks the attempt the hook fired for.
#[derive(Clone, Debug)]
pub struct HookContext {
    pub method: Method,
    pub url: String,
    pub attempt: u32,
    pub request_id: String,
}

/// Response facts passed to `on_after_response`.
#[derive(Clone, Copy, Debug)]
pub struct ResponseSummary {
    pub status: StatusCode,
    pub attempt: u32,
    pub latency_ms: u64,
}

type ContextHook = Arc<dyn Fn(HookContext) -> HookFuture + Send + Sync>;
type ErrorHook = Arc<dyn Fn(HookContext, Error) -> HookFuture + Send + Sync>;
type ResponseHook = Arc<dyn Fn(HookContext, ResponseSummary) -> HookFuture + Send + Sync>;

/// Observer table. Hooks never influence request state, retries or the
/// response; failures inside a hook are swallowed.
#[derive(Clone, Default)]
pub struct Hooks {
    pub(crate) before_request: Option<ContextHook>,
    pub(crate) after_response: Option<ResponseHook>,
    pub(crate) retry: Option<ErrorHook>,
    pub(crate) circuit_open: Option<ContextHook>,
    pub(crate) error: Option<ErrorHook>,
    pub(crate) cancel: Option<ContextHook>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Hooks")
            .field("before_request", &self.before_request.is_some())
            .field("after_response", &self.after_response.is_some())
            .field("retry", &self.retry.is_some())
            .field("circuit_open", &self.circuit_open.is_some())
            .field("error", &self.error.is_some())
            .field("cancel", &self.cancel.is_some())
            .finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_before_request<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.before_request = Some(Arc::new(move |context| -> HookFuture {
            Box::pin(hook(context))
        }));
        self
    }

    pub fn on_after_response<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext, ResponseSummary) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.after_response = Some(Arc::new(move |context, summary| -> HookFuture {
            Box::pin(hook(context, summary))
        }));
        self
    }

    pub fn on_retry<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext, Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.retry = Some(Arc::new(move |context, error| -> HookFuture {
            Box::pin(hook(context, error))
        }));
        self
    }

    pub fn on_circuit_open<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.circuit_open = Some(Arc::new(move |context| -> HookFuture {
            Box::pin(hook(context))
        }));
        self
    }

    pub fn on_error<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext, Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.error = Some(Arc::new(move |context, error| -> HookFuture {
            Box::pin(hook(context, error))
        }));
        self
    }

    pub fn on_cancel<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel = Some(Arc::new(move |context| -> HookFuture {
            Box::pin(hook(context))
        }));
        self
    }

    /// Later tables win per key; unset keys keep the existing hook.
    pub(crate) fn merge(&mut self, overrides: Hooks) {
        if let Some(hook) = overrides.before_request {
            self.before_request = Some(hook);
        }
        if let Some(hook) = overrides.after_response {
            self.after_response = Some(hook);
        }
        if let Some(hook) = overrides.retry {
            self.retry = Some(hook);
        }
        if let Some(hook) = overrides.circuit_open {
            self.circuit_open = Some(hook);
        }
        if let Some(hook) = overrides.error {
            self.error = Some(hook);
        }
        if let Some(hook) = overrides.cancel {
            self.cancel = Some(hook);
        }
    }
}

/// Fires hooks in isolation: each invocation runs as its own task and a
/// panicking hook is absorbed without affecting the request.
#[derive(Debug, Default)]
pub(crate) struct HookRunner {
    hooks: Mutex<Hooks>,
}

impl HookRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn merge(&self, overrides: Hooks) {
        lock_unpoisoned(&self.hooks).merge(overrides);
    }

    fn snapshot(&self) -> Hooks {
        lock_unpoisoned(&self.hooks).clone()
    }

    pub(crate) async fn before_request(&self, context: &HookContext) {
        if let Some(hook) = self.snapshot().before_request {
            run_isolated(hook(context.clone())).await;
        }
    }

    pub(crate) async fn after_response(&self, context: &HookContext, summary: ResponseSummary) {
        if let Some(hook) = self.snapshot().after_response {
            run_isolated(hook(context.clone(), summary)).await;
        }
    }

    pub(crate) async fn retry(&self, context: &HookContext, error: &Error) {
        if let Some(hook) = self.snapshot().retry {
            run_isolated(hook(context.clone(), error.clone())).await;
        }
    }

    pub(crate) async fn circuit_open(&self, context: &HookContext) {
        if let Some(hook) = self.snapshot().circuit_open {
            run_isolated(hook(context.clone())).await;
        }
    }

    pub(crate) async fn error(&self, context: &HookContext, error: &Error) {
        if let Some(hook) = self.snapshot().error {
            run_isolated(hook(context.clone(), error.clone())).await;
        }
    }

    pub(crate) async fn cancel(&self, context: &HookContext) {
        if let Some(hook) = self.snapshot().cancel {
            run_isolated(hook(context.clone())).await;
        }
    }
}

async fn run_isolated(future: HookFuture) {
    let _ = tokio::spawn(future).await;
}
