use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use http::HeaderMap;
use rand::Rng;

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) fn merge_headers(base: &mut HeaderMap, overrides: &HeaderMap) {
    for (name, value) in overrides {
        base.insert(name.clone(), value.clone());
    }
}

/// True when the target already carries a scheme (`https://api.test/x`); such
/// URLs are sent as-is, everything else is prefixed with the client base URL
/// without further normalization.
pub(crate) fn is_absolute_url(url: &str) -> bool {
    let Some((scheme, rest)) = url.split_once("://") else {
        return false;
    };
    if rest.is_empty() {
        return false;
    }
    let mut characters = scheme.chars();
    let Some(first) = characters.next() else {
        return false;
    };
    first.is_ascii_alphabetic()
        && characters.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

pub(crate) fn resolve_url(base_url: &str, target: &str) -> String {
    if is_absolute_url(target) {
        return target.to_owned();
    }
    format!("{base_url}{target}")
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

fn random_base36(length: usize) -> String {
    const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::rng();
    (0..length)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Opaque per-call identifier: `req_<unix millis>_<7 base36 chars>`.
pub(crate) fn generate_request_id() -> String {
    format!("req_{}_{}", now_millis(), random_base36(7))
}

/// Auto-generated idempotency key: `idem_<unix millis>_<9 base36 chars>`.
pub(crate) fn generate_idempotency_key() -> String {
    format!("idem_{}_{}", now_millis(), random_base36(9))
}

#[cfg(test)]
mod tests {
    use http::HeaderMap;
    use http::header::HeaderValue;

    use super::{
        generate_idempotency_key, generate_request_id, is_absolute_url, merge_headers, resolve_url,
    };

    #[test]
    fn absolute_url_detection() {
        assert!(is_absolute_url("https://api.example.com/v1"));
        assert!(is_absolute_url("http://localhost:8080"));
        assert!(is_absolute_url("ws+unix://socket"));
        assert!(!is_absolute_url("/v1/users"));
        assert!(!is_absolute_url("users/1"));
        assert!(!is_absolute_url("://missing-scheme"));
        assert!(!is_absolute_url("1abc://digit-scheme"));
    }

    #[test]
    fn relative_targets_are_prefixed_verbatim() {
        assert_eq!(
            resolve_url("https://api.example.com", "/users/1"),
            "https://api.example.com/users/1"
        );
        // Concatenation is literal, no slash fixing.
        assert_eq!(
            resolve_url("https://api.example.com/v1", "users"),
            "https://api.example.com/v1users"
        );
        assert_eq!(
            resolve_url("https://api.example.com", "https://other.test/x"),
            "https://other.test/x"
        );
    }

    #[test]
    fn merged_headers_prefer_overrides() {
        let mut base = HeaderMap::new();
        base.insert("x-shared", HeaderValue::from_static("default"));
        base.insert("x-only-default", HeaderValue::from_static("kept"));
        let mut overrides = HeaderMap::new();
        overrides.insert("x-shared", HeaderValue::from_static("request"));
        merge_headers(&mut base, &overrides);
        assert_eq!(base.get("x-shared").unwrap(), "request");
        assert_eq!(base.get("x-only-default").unwrap(), "kept");
    }

    #[test]
    fn request_id_shape() {
        let id = generate_request_id();
        let mut parts = id.splitn(3, '_');
        assert_eq!(parts.next(), Some("req"));
        let millis = parts.next().expect("millis segment");
        assert!(millis.chars().all(|c| c.is_ascii_digit()));
        let suffix = parts.next().expect("random segment");
        assert_eq!(suffix.len(), 7);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn idempotency_key_shape() {
        let key = generate_idempotency_key();
        assert!(key.starts_with("idem_"));
        let suffix = key.rsplit('_').next().expect("random segment");
        assert_eq!(suffix.len(), 9);
    }
}
