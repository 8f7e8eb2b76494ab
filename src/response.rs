//! Outbound response sink.
//!
//! Handlers never build a response value and return it. They write into a
//! [`ResponseWriter`], the same way several handlers in a combined chain all
//! get to touch one reply. Whatever was written when the chain finishes is
//! what the client receives, and an untouched writer yields an empty `200`.

use bytes::{Bytes, BytesMut};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use tracing::warn;

/// The response being assembled for one request.
#[derive(Debug, Default)]
pub struct ResponseWriter {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits the status code. Only the first call takes effect.
    pub fn write_status(&mut self, status: StatusCode) {
        match self.status {
            None => self.status = Some(status),
            Some(current) if current != status => {
                warn!(%current, ignored = %status, "superfluous write_status call");
            }
            Some(_) => {}
        }
    }

    /// Appends body bytes, committing `200 OK` if no status was written yet.
    pub fn write(&mut self, bytes: impl AsRef<[u8]>) {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(bytes.as_ref());
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Adds a header value, keeping any values already set under `name`.
    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    /// Sets a header, replacing any values already set under `name`.
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// The committed status, or `200 OK` if nothing committed one.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Whether a status or any body bytes have been written.
    pub fn is_written(&self) -> bool {
        self.status.is_some()
    }

    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let status = self.status();
        let mut res = http::Response::new(Full::new(self.body.freeze()));
        *res.status_mut() = status;
        *res.headers_mut() = self.headers;
        res
    }
}
