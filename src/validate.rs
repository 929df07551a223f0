use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Post-success assertion over the decoded response payload.
///
/// `parse` receives the decoded body (JSON value, or a string value for
/// non-JSON responses) and returns the payload to deliver, possibly refined.
/// A failed parse never feeds the circuit breaker and is never retried; in
/// performance mode the client skips validator invocation entirely.
pub trait ResponseValidator: Send + Sync {
    fn parse(&self, raw: &Value) -> Result<Value, Vec<String>>;
}

/// Validator asserting the payload deserializes into `T`; the payload itself
/// is delivered unchanged, so callers keep using [`Response::json`] for typed
/// access.
///
/// [`Response::json`]: crate::response::Response::json
pub struct TypeCheck<T> {
    marker: PhantomData<fn() -> T>,
}

impl<T> TypeCheck<T> {
    pub fn new() -> Self {
        Self {
            marker: PhantomData,
        }
    }
}

impl<T> Default for TypeCheck<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResponseValidator for TypeCheck<T>
where
    T: DeserializeOwned + Send + Sync,
{
    fn parse(&self, raw: &Value) -> Result<Value, Vec<String>> {
        match serde_json::from_value::<T>(raw.clone()) {
            Ok(_) => Ok(raw.clone()),
            Err(error) => Err(vec![error.to_string()]),
        }
    }
}
