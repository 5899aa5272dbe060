// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Parsing and classification of eMAG responses.
//!
//! eMAG endpoint families disagree on how success is signalled, so [`is_success_payload`]
//! accepts three shapes: `isError: false`, a `data` key without any `isError` key, and
//! `success: true`. Error payloads are equally varied; [`extract_error_details`] collects the
//! known message fields into one object.

use std::time::Duration;

use serde_json::{Map, Value, json};

/// Normalizes a base URL so it ends with exactly one `/`.
#[must_use]
pub fn normalize_base_url(url: &str) -> String {
    format!("{}/", url.trim().trim_end_matches('/'))
}

/// Joins a resource and an action into a relative path without a leading slash.
#[must_use]
pub fn join_path(resource: &str, action: &str) -> String {
    format!("{}/{}", resource.trim_matches('/'), action.trim_matches('/'))
}

/// Decodes a response body as JSON, falling back to `{"raw": text, "status": code}`.
#[must_use]
pub fn decode_body(status: u16, body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap_or_else(|_| {
        json!({
            "raw": String::from_utf8_lossy(body),
            "status": status,
        })
    })
}

/// Returns whether a decoded payload signals success.
#[must_use]
pub fn is_success_payload(payload: &Value) -> bool {
    let Some(object) = payload.as_object() else {
        return false;
    };

    match object.get("isError") {
        Some(Value::Bool(false)) => return true,
        None if object.contains_key("data") => return true,
        _ => {}
    }

    matches!(object.get("success"), Some(Value::Bool(true)))
}

/// Collects error details from a decoded payload.
///
/// Non-object payloads are wrapped as `{"raw": payload}`. For objects, non-empty `messages`,
/// `errors`, `error` and `message` fields are copied, as are non-empty `errors` and `messages`
/// nested under an object `data` (keyed `data.errors` and `data.messages`). When nothing is
/// found the payload itself is returned.
#[must_use]
pub fn extract_error_details(payload: &Value) -> Value {
    let Some(object) = payload.as_object() else {
        return json!({ "raw": payload });
    };

    let mut details = Map::new();
    for key in ["messages", "errors", "error", "message"] {
        if let Some(value) = object.get(key).filter(|v| is_present(v)) {
            details.insert(key.to_string(), value.clone());
        }
    }

    if let Some(data) = object.get("data").and_then(Value::as_object) {
        for key in ["errors", "messages"] {
            if let Some(value) = data.get(key).filter(|v| is_present(v)) {
                details.insert(format!("data.{key}"), value.clone());
            }
        }
    }

    if details.is_empty() {
        payload.clone()
    } else {
        Value::Object(details)
    }
}

/// Parses a numeric `Retry-After` header value in seconds.
///
/// HTTP-date values, negative and non-finite numbers are ignored. Values too large for a
/// [`Duration`] saturate to [`Duration::MAX`].
#[must_use]
pub fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    let seconds: f64 = value?.trim().parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX))
}

// Mirrors truthiness: null, false, 0, "" and empty containers count as absent
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("https://marketplace-api.emag.ro/api-3", "https://marketplace-api.emag.ro/api-3/")]
    #[case("https://marketplace-api.emag.ro/api-3/", "https://marketplace-api.emag.ro/api-3/")]
    #[case("http://127.0.0.1:8080/api-3//", "http://127.0.0.1:8080/api-3/")]
    fn test_normalize_base_url(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_base_url(input), expected);
    }

    #[rstest]
    #[case("order", "acknowledge", "order/acknowledge")]
    #[case("/order/", "/read", "order/read")]
    #[case("product_offer", "save/", "product_offer/save")]
    fn test_join_path(#[case] resource: &str, #[case] action: &str, #[case] expected: &str) {
        assert_eq!(join_path(resource, action), expected);
    }

    #[rstest]
    fn test_decode_body_json() {
        assert_eq!(decode_body(200, br#"{"isError":false}"#), json!({"isError": false}));
    }

    #[rstest]
    fn test_decode_body_fallback() {
        assert_eq!(
            decode_body(502, b"<html>Bad Gateway</html>"),
            json!({"raw": "<html>Bad Gateway</html>", "status": 502})
        );
    }

    #[rstest]
    #[case(json!({"isError": false, "data": {"id": 1}}), true)]
    #[case(json!({"isError": false}), true)]
    #[case(json!({"data": {"id": 1}}), true)]
    #[case(json!({"data": null}), true)]
    #[case(json!({"success": true}), true)]
    #[case(json!({"isError": true, "success": true}), true)]
    #[case(json!({"isError": true, "messages": ["x"]}), false)]
    #[case(json!({"isError": true, "data": {}}), false)]
    #[case(json!({"isError": "false", "data": {}}), false)]
    #[case(json!({"success": "true"}), false)]
    #[case(json!({}), false)]
    #[case(json!([1, 2]), false)]
    #[case(json!("ok"), false)]
    fn test_is_success_payload(#[case] payload: Value, #[case] expected: bool) {
        assert_eq!(is_success_payload(&payload), expected);
    }

    #[rstest]
    fn test_extract_error_details_top_level() {
        let payload = json!({"isError": true, "messages": ["x"], "errors": [], "code": 7});
        assert_eq!(extract_error_details(&payload), json!({"messages": ["x"]}));
    }

    #[rstest]
    fn test_extract_error_details_nested_data() {
        let payload = json!({
            "isError": true,
            "message": "Validation failed",
            "data": {"errors": [{"field": "sku"}], "messages": []}
        });
        assert_eq!(
            extract_error_details(&payload),
            json!({"message": "Validation failed", "data.errors": [{"field": "sku"}]})
        );
    }

    #[rstest]
    fn test_extract_error_details_nothing_known() {
        let payload = json!({"isError": true, "code": 500});
        assert_eq!(extract_error_details(&payload), payload);
    }

    #[rstest]
    fn test_extract_error_details_non_object() {
        assert_eq!(
            extract_error_details(&json!(["a", "b"])),
            json!({"raw": ["a", "b"]})
        );
    }

    #[rstest]
    #[case(Some("3"), Some(Duration::from_secs(3)))]
    #[case(Some(" 2.5 "), Some(Duration::from_millis(2_500)))]
    #[case(Some("0"), Some(Duration::ZERO))]
    #[case(Some("-1"), None)]
    #[case(Some("inf"), None)]
    #[case(Some("1e30"), Some(Duration::MAX))]
    #[case(Some("1e400"), None)]
    #[case(Some("Wed, 21 Oct 2026 07:28:00 GMT"), None)]
    #[case(None, None)]
    fn test_parse_retry_after(#[case] value: Option<&str>, #[case] expected: Option<Duration>) {
        assert_eq!(parse_retry_after(value), expected);
    }
}
