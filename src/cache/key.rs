//! Cache key derivation.

use http::Method;

use crate::models::RequestBody;

/// Builds the cache key `METHOD:URL:BODY`.
///
/// JSON bodies are serialized with sorted object keys, so two requests with
/// the same JSON content map to the same key regardless of field order.
pub fn cache_key(method: &Method, url: &str, body: Option<&RequestBody>) -> String {
    let fingerprint = body.map(RequestBody::fingerprint).unwrap_or_default();
    format!("{}:{}:{}", method.as_str(), url, fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_without_body() {
        assert_eq!(
            cache_key(&Method::GET, "https://api.example.com/users", None),
            "GET:https://api.example.com/users:"
        );
    }

    #[test]
    fn test_key_distinguishes_method_and_body() {
        let url = "https://api.example.com/search";
        let a = RequestBody::Json(json!({"q": "rust"}));
        let b = RequestBody::Json(json!({"q": "go"}));

        assert_ne!(cache_key(&Method::GET, url, Some(&a)), cache_key(&Method::GET, url, Some(&b)));
        assert_ne!(cache_key(&Method::GET, url, None), cache_key(&Method::HEAD, url, None));
    }

    #[test]
    fn test_json_key_order_is_canonical() {
        let url = "https://api.example.com/search";
        let a: serde_json::Value = serde_json::from_str(r#"{"b":1,"a":{"y":2,"x":3}}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"a":{"x":3,"y":2},"b":1}"#).unwrap();

        assert_eq!(
            cache_key(&Method::POST, url, Some(&RequestBody::Json(a))),
            cache_key(&Method::POST, url, Some(&RequestBody::Json(b)))
        );
    }
}
