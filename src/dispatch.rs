//! Request recording and positional dispatch.
//!
//! For every request: record it, take its zero-based ordinal as the slot
//! index, run that slot's handler. When the queue has no slot for the
//! ordinal the unhandled policy decides the reply. The server calls
//! `Dispatcher::dispatch` with the dispatcher locked, so the three steps
//! are one atomic unit per request.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use http::StatusCode;
use tracing::{debug, warn};

use crate::fail::{Fail, Reported};
use crate::registry::HandlerQueue;
use crate::request::Request;
use crate::response::ResponseWriter;

/// Marker every unhandled-request failure message starts with.
pub const UNHANDLED_REQUEST: &str = "Received Unhandled Request";

pub(crate) struct Dispatcher {
    pub(crate) handlers: HandlerQueue,
    received: Vec<Request>,
    pub(crate) allow_unhandled: bool,
    pub(crate) unhandled_status: StatusCode,
}

impl Dispatcher {
    pub fn new(allow_unhandled: bool, unhandled_status: StatusCode) -> Self {
        Self {
            handlers: HandlerQueue::new(),
            received: Vec::new(),
            allow_unhandled,
            unhandled_status,
        }
    }

    /// Records `req` and produces the reply for it.
    pub fn dispatch(&mut self, req: Request, fail: &Fail) -> ResponseWriter {
        let index = self.received.len();
        self.received.push(req);
        let req = &self.received[index];

        let mut res = ResponseWriter::new();
        match self.handlers.get(index) {
            Ok(handler) => {
                debug!(index, method = %req.method(), path = %req.raw_path(), "dispatching request");
                let outcome = catch_unwind(AssertUnwindSafe(|| handler.call(req, &mut res, fail)));
                match outcome {
                    Ok(()) => {}
                    // The collaborator panicked on a report it already received.
                    Err(panic) if Reported::is_reported(&*panic) => {}
                    Err(panic) => fail.fail_contained(&format!(
                        "handler #{index} panicked: {}",
                        panic_message(&*panic)
                    )),
                }
            }
            Err(_) if self.allow_unhandled => {
                warn!(index, method = %req.method(), uri = %req.uri(), status = %self.unhandled_status, "allowing unhandled request");
                res.write_status(self.unhandled_status);
            }
            Err(_) => {
                fail.fail_contained(&format!("{UNHANDLED_REQUEST}: {} {}", req.method(), req.uri()));
            }
        }
        res
    }

    /// Every request seen so far, in arrival order.
    pub fn received_requests(&self) -> &[Request] {
        &self.received
    }

    /// Drops every handler and every recorded request.
    pub fn reset(&mut self) {
        self.handlers.clear();
        self.received.clear();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
