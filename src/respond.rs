//! Response primitives.
//!
//! [`respond_with`] fixes status and body when the handler is built.
//! [`respond_with_slot`] reads them from [`Slot`]s each time the handler
//! runs, so a test can re-script a reply after registering it.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use serde::Serialize;

use crate::fail::Fail;
use crate::handler::Handler;
use crate::request::Request;
use crate::response::ResponseWriter;
use crate::slot::Slot;

// ── Fixed ─────────────────────────────────────────────────────────────────────

pub struct RespondWith {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

/// Replies with `status` and `body`.
pub fn respond_with(status: StatusCode, body: impl Into<Bytes>) -> RespondWith {
    RespondWith { status, headers: HeaderMap::new(), body: body.into() }
}

impl RespondWith {
    /// Adds a header to the reply. Repeat for multi-valued headers.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }
}

impl Handler for RespondWith {
    fn call(&self, _req: &Request, res: &mut ResponseWriter, _fail: &Fail) {
        for (name, value) in &self.headers {
            res.append_header(name.clone(), value.clone());
        }
        res.write_status(self.status);
        res.write(&self.body);
    }
}

// ── Late-bound ────────────────────────────────────────────────────────────────

pub struct RespondWithSlot<B> {
    status: Slot<StatusCode>,
    body: Slot<B>,
}

/// Replies with whatever `status` and `body` hold when the request arrives.
pub fn respond_with_slot<B>(status: &Slot<StatusCode>, body: &Slot<B>) -> RespondWithSlot<B>
where
    B: AsRef<[u8]> + Send + 'static,
{
    RespondWithSlot { status: status.clone(), body: body.clone() }
}

impl<B> Handler for RespondWithSlot<B>
where
    B: AsRef<[u8]> + Send + 'static,
{
    fn call(&self, _req: &Request, res: &mut ResponseWriter, _fail: &Fail) {
        res.write_status(self.status.get());
        self.body.with(|body| res.write(body));
    }
}

// ── JSON ──────────────────────────────────────────────────────────────────────

pub struct RespondWithJson {
    status: StatusCode,
    body: Result<Bytes, String>,
}

/// Replies with `value` encoded as JSON and `Content-Type: application/json`.
///
/// Encoding happens once, up front. If it fails, each call reports the
/// error and leaves the response untouched.
pub fn respond_with_json_encoded<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> RespondWithJson {
    RespondWithJson {
        status,
        body: serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| format!("Response value could not be encoded as JSON: {e}")),
    }
}

impl Handler for RespondWithJson {
    fn call(&self, _req: &Request, res: &mut ResponseWriter, fail: &Fail) {
        match &self.body {
            Ok(body) => {
                res.insert_header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                res.write_status(self.status);
                res.write(body);
            }
            Err(e) => fail.fail(e),
        }
    }
}
