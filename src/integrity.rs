use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Error;
use crate::util::lock_unpoisoned;

/// Deterministic text form of a request body used as fingerprint input:
/// empty string when absent, compact JSON otherwise. `serde_json::Map`
/// serializes object keys in sorted order, so the form is stable across
/// insertion orders.
pub(crate) fn canonicalize(body: Option<&Value>) -> String {
    match body {
        None => String::new(),
        Some(value) => value.to_string(),
    }
}

/// Lowercase hex SHA-256 of the canonicalized body.
pub(crate) fn fingerprint(body: Option<&Value>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonicalize(body).as_bytes());
    hex::encode(hasher.finalize())
}

/// Idempotency-key to payload-fingerprint registry, owned by one client.
///
/// The first body seen under a key pins its fingerprint; any later use of the
/// key with a different fingerprint is rejected while both stay remembered.
/// Entries have no TTL.
#[derive(Debug, Default)]
pub(crate) struct IntegrityRegistry {
    entries: Mutex<HashMap<String, String>>,
}

impl IntegrityRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn enforce(&self, key: &str, body: Option<&Value>) -> Result<String, Error> {
        let fingerprint = fingerprint(body);
        let mut entries = lock_unpoisoned(&self.entries);
        match entries.get(key) {
            Some(pinned) if *pinned != fingerprint => Err(Error::IntegrityViolation {
                message: format!("idempotency key {key} was already used with a different payload"),
            }),
            Some(_) => Ok(fingerprint),
            None => {
                entries.insert(key.to_owned(), fingerprint.clone());
                Ok(fingerprint)
            }
        }
    }
}
