use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Error;

/// Outcome of a successful call: the decoded payload plus per-call metadata.
///
/// `payload` is the JSON document for `application/json` responses and a JSON
/// string value for everything else. `attempt` is 1-based and `latency_ms`
/// covers the winning attempt only. Header names are lowercase by
/// construction of [`http::HeaderMap`].
#[derive(Clone, Debug)]
pub struct Response {
    payload: Value,
    status: StatusCode,
    headers: HeaderMap,
    request_id: String,
    attempt: u32,
    latency_ms: u64,
}

impl Response {
    pub(crate) fn new(
        payload: Value,
        status: StatusCode,
        headers: HeaderMap,
        request_id: String,
        attempt: u32,
        latency_ms: u64,
    ) -> Self {
        Self {
            payload,
            status,
            headers,
            request_id,
            attempt,
            latency_ms,
        }
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    /// Deserialize the payload into a concrete type.
    pub fn json<T>(&self) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_value(self.payload.clone()).map_err(|source| Error::ResponseValidation {
            message: "failed to decode response payload".to_owned(),
            issues: vec![source.to_string()],
        })
    }

    /// Payload as text: the string itself for text responses, compact JSON
    /// otherwise.
    pub fn text(&self) -> String {
        match &self.payload {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use http::{HeaderMap, StatusCode};
    use serde::Deserialize;
    use serde_json::json;

    use super::Response;
    use crate::error::ErrorCode;

    fn sample(payload: serde_json::Value) -> Response {
        Response::new(
            payload,
            StatusCode::OK,
            HeaderMap::new(),
            "req_0_abcdefg".to_owned(),
            1,
            12,
        )
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u64,
    }

    #[test]
    fn json_decodes_typed_payload() {
        let response = sample(json!({"id": 7}));
        assert_eq!(response.json::<Item>().unwrap(), Item { id: 7 });
    }

    #[test]
    fn json_mismatch_is_a_validation_error() {
        let response = sample(json!({"id": "not-a-number"}));
        let error = response.json::<Item>().expect_err("type mismatch");
        assert_eq!(error.code(), ErrorCode::ResponseValidation);
    }

    #[test]
    fn text_unwraps_string_payloads() {
        assert_eq!(sample(json!("plain body")).text(), "plain body");
        assert_eq!(sample(json!({"a": 1})).text(), r#"{"a":1}"#);
    }
}
