//! Request verification primitives.
//!
//! Each primitive is a [`Handler`] that inspects the request and reports a
//! failure for every mismatch it finds. None of them write to the response
//! and none of them stop the handlers that come after them in a chain.
//!
//! ```rust
//! use fakeserve::{combine, verify_json, verify_request};
//! use http::Method;
//!
//! let expect_create = combine!(
//!     verify_request(Method::POST, "/users"),
//!     verify_json(r#"{"name":"alice"}"#),
//! );
//! # let _ = expect_create;
//! ```

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method};
use serde::Serialize;
use serde_json::Value;

use crate::fail::Fail;
use crate::handler::Handler;
use crate::request::Request;
use crate::response::ResponseWriter;

// ── Method, path, query ───────────────────────────────────────────────────────

pub struct VerifyRequest {
    method: Method,
    path: String,
    raw_query: Option<String>,
}

/// Checks the method and the (percent-decoded) path exactly.
pub fn verify_request(method: Method, path: impl Into<String>) -> VerifyRequest {
    VerifyRequest { method, path: path.into(), raw_query: None }
}

impl VerifyRequest {
    /// Also require the raw, undecoded query string to equal `query`.
    pub fn raw_query(mut self, query: impl Into<String>) -> Self {
        self.raw_query = Some(query.into());
        self
    }
}

impl Handler for VerifyRequest {
    fn call(&self, req: &Request, _res: &mut ResponseWriter, fail: &Fail) {
        if *req.method() != self.method {
            fail.fail(format!("Expected method {}, got {}", self.method, req.method()));
        }
        let path = req.path();
        if path.as_ref() != self.path.as_str() {
            fail.fail(format!("Expected path {:?}, got {:?}", self.path, path));
        }
        if let Some(expected) = &self.raw_query {
            let actual = req.query().unwrap_or("");
            if actual != expected {
                fail.fail(format!("Expected raw query {expected:?}, got {actual:?}"));
            }
        }
    }
}

// ── Content-Type ──────────────────────────────────────────────────────────────

pub struct VerifyContentType {
    expected: String,
}

/// Checks the `Content-Type` header exactly, parameters included.
pub fn verify_content_type(expected: impl Into<String>) -> VerifyContentType {
    VerifyContentType { expected: expected.into() }
}

impl Handler for VerifyContentType {
    fn call(&self, req: &Request, _res: &mut ResponseWriter, fail: &Fail) {
        // Compared as bytes so a non-ASCII value still shows up as present.
        match req.headers().get(CONTENT_TYPE) {
            Some(actual) if actual.as_bytes() == self.expected.as_bytes() => {}
            Some(actual) => fail.fail(format!(
                "Expected Content-Type {:?}, got {actual:?}",
                self.expected
            )),
            None => fail.fail(format!(
                "Expected Content-Type {:?}, but the request has none",
                self.expected
            )),
        }
    }
}

// ── Basic auth ────────────────────────────────────────────────────────────────

pub struct VerifyBasicAuth {
    user: String,
    password: String,
}

pub fn verify_basic_auth(user: impl Into<String>, password: impl Into<String>) -> VerifyBasicAuth {
    VerifyBasicAuth { user: user.into(), password: password.into() }
}

impl Handler for VerifyBasicAuth {
    fn call(&self, req: &Request, _res: &mut ResponseWriter, fail: &Fail) {
        match req.basic_auth() {
            Some((user, password)) if user == self.user && password == self.password => {}
            Some((user, _)) => fail.fail(format!(
                "Expected basic auth credentials for {:?}, got {user:?} (or a different password)",
                self.user
            )),
            None => fail.fail("Expected basic auth credentials, but the request carries none"),
        }
    }
}

// ── Headers ───────────────────────────────────────────────────────────────────

pub struct VerifyHeader {
    expected: HeaderMap,
}

/// For every name in `expected`, checks that the request carries exactly
/// those values in that order. Names are matched case-insensitively and
/// headers not named in `expected` are ignored.
pub fn verify_header(expected: HeaderMap) -> VerifyHeader {
    VerifyHeader { expected }
}

impl Handler for VerifyHeader {
    fn call(&self, req: &Request, _res: &mut ResponseWriter, fail: &Fail) {
        for name in self.expected.keys() {
            let expected: Vec<&HeaderValue> = self.expected.get_all(name).iter().collect();
            let actual: Vec<&HeaderValue> = req.headers().get_all(name).iter().collect();
            if actual.is_empty() {
                fail.fail(format!("Expected header {name} = {expected:?}, but it is missing"));
            } else if actual != expected {
                fail.fail(format!("Expected header {name} = {expected:?}, got {actual:?}"));
            }
        }
    }
}

// ── JSON ──────────────────────────────────────────────────────────────────────

/// Compares the request body to an expected JSON document structurally.
pub struct VerifyJson {
    expected: Result<Value, String>,
}

/// Checks for a JSON `Content-Type` and a body semantically equal to
/// `expected`: key order and whitespace do not matter.
///
/// If `expected` itself is not valid JSON, every call reports that.
pub fn verify_json(expected: &str) -> VerifyJson {
    VerifyJson {
        expected: serde_json::from_str(expected)
            .map_err(|e| format!("Expected value {expected:?} is not valid JSON: {e}")),
    }
}

/// Like [`verify_json`], comparing against `value`'s JSON representation.
pub fn verify_json_representing<T: Serialize + ?Sized>(value: &T) -> VerifyJson {
    VerifyJson {
        expected: serde_json::to_value(value)
            .map_err(|e| format!("Expected value could not be encoded as JSON: {e}")),
    }
}

impl Handler for VerifyJson {
    fn call(&self, req: &Request, _res: &mut ResponseWriter, fail: &Fail) {
        match req.headers().get(CONTENT_TYPE).map(HeaderValue::to_str) {
            Some(Ok(ct)) if is_json_media_type(ct) => {}
            Some(Ok(ct)) => fail.fail(format!("Expected a JSON Content-Type, got {ct:?}")),
            Some(Err(_)) => fail.fail(format!(
                "Expected a JSON Content-Type, got a non-ASCII value {:?}",
                req.headers()[CONTENT_TYPE]
            )),
            None => fail.fail("Expected a JSON Content-Type, but the request has none"),
        }

        let expected = match &self.expected {
            Ok(v) => v,
            Err(e) => return fail.fail(e),
        };
        match serde_json::from_slice::<Value>(req.body()) {
            Ok(actual) if actual == *expected => {}
            Ok(actual) => fail.fail(format!("Expected JSON body {expected}, got {actual}")),
            Err(e) => fail.fail(format!(
                "Expected JSON body {expected}, but the body is not JSON ({e}): {:?}",
                String::from_utf8_lossy(req.body())
            )),
        }
    }
}

/// `application/json`, any `+json` structured syntax, parameters ignored.
fn is_json_media_type(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    essence == "application/json" || (essence.starts_with("application/") && essence.ends_with("+json"))
}

// ── Raw body ──────────────────────────────────────────────────────────────────

pub struct VerifyBody {
    expected: Bytes,
}

/// Checks the body byte-for-byte.
pub fn verify_body(expected: impl Into<Bytes>) -> VerifyBody {
    VerifyBody { expected: expected.into() }
}

impl Handler for VerifyBody {
    fn call(&self, req: &Request, _res: &mut ResponseWriter, fail: &Fail) {
        if *req.body() != self.expected {
            fail.fail(format!(
                "Expected body {:?}, got {:?}",
                String::from_utf8_lossy(&self.expected),
                String::from_utf8_lossy(req.body())
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use http::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL};

    use super::*;
    use crate::fail::FailureLog;

    fn run(handler: impl Handler, req: http::request::Builder, body: &'static str) -> Vec<String> {
        let log = FailureLog::new();
        let req = Request::from(req.body(Bytes::from_static(body.as_bytes())).unwrap());
        handler.call(&req, &mut ResponseWriter::new(), &Fail::new(log.clone()));
        log.messages()
    }

    fn get(uri: &str) -> http::request::Builder {
        http::Request::builder().method(Method::GET).uri(uri)
    }

    fn post_json(uri: &str) -> http::request::Builder {
        http::Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
    }

    #[test]
    fn request_ignores_query_unless_asked() {
        assert!(run(verify_request(Method::GET, "/foo"), get("/foo?baz=bar"), "").is_empty());
    }

    #[test]
    fn request_rejects_wrong_path_or_method() {
        assert_eq!(run(verify_request(Method::GET, "/foo"), get("/foo2"), "").len(), 1);
        assert_eq!(run(verify_request(Method::GET, "/foo"), post_json("/foo"), "").len(), 1);
    }

    #[test]
    fn request_checks_raw_query() {
        let v = || verify_request(Method::GET, "/foo").raw_query("baz=bar");
        assert!(run(v(), get("/foo?baz=bar"), "").is_empty());
        assert_eq!(run(v(), get("/foo?baz=qux"), "").len(), 1);
        assert_eq!(run(v(), get("/foo"), "").len(), 1);
    }

    #[test]
    fn content_type_must_match_exactly() {
        let v = || verify_content_type("application/octet-stream");
        assert!(run(v(), get("/").header(CONTENT_TYPE, "application/octet-stream"), "").is_empty());
        assert_eq!(run(v(), get("/").header(CONTENT_TYPE, "application/json"), "").len(), 1);
        assert_eq!(run(v(), get("/"), "").len(), 1);
    }

    #[test]
    fn basic_auth_checks_user_and_password() {
        let v = || verify_basic_auth("bob", "password");
        // bob:password / bob:bassword
        assert!(run(v(), get("/").header(AUTHORIZATION, "Basic Ym9iOnBhc3N3b3Jk"), "").is_empty());
        assert_eq!(run(v(), get("/").header(AUTHORIZATION, "Basic Ym9iOmJhc3N3b3Jk"), "").len(), 1);
        assert_eq!(run(v(), get("/"), "").len(), 1);
    }

    fn expected_headers() -> HeaderMap {
        let mut expected = HeaderMap::new();
        expected.append(ACCEPT, HeaderValue::from_static("jpeg"));
        expected.append(ACCEPT, HeaderValue::from_static("png"));
        expected.append(CACHE_CONTROL, HeaderValue::from_static("omicron"));
        expected.append("return-path", HeaderValue::from_static("hobbiton"));
        expected
    }

    #[test]
    fn header_values_match_case_insensitively() {
        let req = get("/")
            .header("Accept", "jpeg")
            .header("Accept", "png")
            .header("Cache-Control", "omicron")
            .header("Return-Path", "hobbiton")
            .header("X-Unrelated", "ignored");

        assert!(run(verify_header(expected_headers()), req, "").is_empty());
    }

    #[test]
    fn header_missing_is_one_failure() {
        let req = get("/")
            .header("Schmaccept", "jpeg")
            .header("Schmaccept", "png")
            .header("Cache-Control", "omicron")
            .header("return-path", "hobbiton");

        let failures = run(verify_header(expected_headers()), req, "");
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("accept"));
    }

    #[test]
    fn header_value_order_matters() {
        let req = get("/")
            .header("Accept", "png")
            .header("Accept", "jpeg")
            .header("Cache-Control", "omicron")
            .header("return-path", "hobbiton");

        assert_eq!(run(verify_header(expected_headers()), req, "").len(), 1);
    }

    #[test]
    fn json_ignores_key_order_and_whitespace() {
        let v = || verify_json(r#"{"a":3, "b":2}"#);
        assert!(run(v(), post_json("/foo"), r#"{"b":2,"a":3}"#).is_empty());
        assert_eq!(run(v(), post_json("/foo"), r#"{"b":2, "a":4}"#).len(), 1);
    }

    #[test]
    fn json_requires_json_content_type() {
        let req = http::Request::builder().method(Method::POST).uri("/foo").header(CONTENT_TYPE, "text/plain");

        assert_eq!(run(verify_json(r#"{"a":3}"#), req, r#"{"a":3}"#).len(), 1);
    }

    fn non_ascii_content_type() -> http::request::Builder {
        let value = HeaderValue::from_bytes(b"application/\xe9").unwrap();
        http::Request::builder().method(Method::POST).uri("/foo").header(CONTENT_TYPE, value)
    }

    #[test]
    fn content_type_with_non_ascii_value_is_a_mismatch() {
        let failures = run(verify_content_type("application/json"), non_ascii_content_type(), "");
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains(r#"got "application/\xe9""#), "{}", failures[0]);
        assert!(!failures[0].contains("has none"));
    }

    #[test]
    fn json_with_non_ascii_content_type_is_not_missing() {
        let failures = run(verify_json(r#"{"a":3}"#), non_ascii_content_type(), r#"{"a":3}"#);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("non-ASCII"));
        assert!(!failures[0].contains("has none"));
    }

    #[test]
    fn json_accepts_parameters_and_suffixes() {
        assert!(is_json_media_type("application/json; charset=utf-8"));
        assert!(is_json_media_type("application/problem+json"));
        assert!(!is_json_media_type("text/json-ish"));
    }

    #[test]
    fn json_reports_unparseable_body() {
        let failures = run(verify_json(r#"{"a":3}"#), post_json("/foo"), "not json");
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("not JSON"));
    }

    #[test]
    fn invalid_expected_json_is_reported_at_call_time() {
        let failures = run(verify_json("{oops"), post_json("/foo"), "{}");
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("not valid JSON"));
    }

    #[test]
    fn json_representing_serializes_expected_value() {
        #[derive(Serialize)]
        struct Pet {
            name: &'static str,
            age: u8,
        }

        let v = || verify_json_representing(&Pet { name: "rex", age: 3 });
        assert!(run(v(), post_json("/pets"), r#"{"age":3,"name":"rex"}"#).is_empty());
        assert_eq!(run(v(), post_json("/pets"), r#"{"age":4,"name":"rex"}"#).len(), 1);
    }

    #[test]
    fn body_matches_bytes() {
        assert!(run(verify_body("hello"), get("/"), "hello").is_empty());
        assert_eq!(run(verify_body("hello"), get("/"), "hullo").len(), 1);
    }
}
