//! Handler trait, type erasure and composition.
//!
//! # How handlers are stored
//!
//! The queue holds handlers of *different* types — verification structs,
//! response structs, user closures, combined chains — in one `Vec`. Like any
//! Rust collection it can only hold one concrete type, so every handler is
//! erased behind `Arc<dyn Handler>`:
//!
//! ```text
//! verify_request(Method::GET, "/foo")       ← concrete VerifyRequest
//!        ↓ server.append_handler(..)
//! handler.into_boxed_handler()              ← provided trait method
//!        ↓
//! Arc::new(handler)                         ← stored as BoxedHandler
//!        ↓
//! handler.call(&req, &mut res, &fail)       ← one vtable dispatch per request
//! ```
//!
//! `Arc` rather than `Box` so that [`Server::get_handler`](crate::Server::get_handler)
//! can hand a slot's handler out for direct invocation while the queue keeps it.

use std::sync::Arc;

use crate::fail::Fail;
use crate::request::Request;
use crate::response::ResponseWriter;

/// A unit of scripted behaviour, invoked once for the request it serves.
///
/// A handler may inspect the request, write to the response, and report
/// failures through `fail`. It must not block for long: the dispatch lock is
/// held while it runs.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: &Request, res: &mut ResponseWriter, fail: &Fail);

    fn into_boxed_handler(self) -> BoxedHandler
    where
        Self: Sized,
    {
        Arc::new(self)
    }
}

/// A type-erased handler, shared between the queue and direct callers.
pub type BoxedHandler = Arc<dyn Handler>;

// ── Closures ──────────────────────────────────────────────────────────────────

/// Newtype that lets a closure act as a [`Handler`].
pub struct FnHandler<F>(F);

/// Wraps a closure as a handler.
///
/// ```rust
/// use fakeserve::{handler_fn, Handler};
///
/// let h = handler_fn(|req, res, _fail| {
///     res.write(format!("you asked for {}", req.path()));
/// });
/// # let _ = h.into_boxed_handler();
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&Request, &mut ResponseWriter, &Fail) + Send + Sync + 'static,
{
    FnHandler(f)
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&Request, &mut ResponseWriter, &Fail) + Send + Sync + 'static,
{
    fn call(&self, req: &Request, res: &mut ResponseWriter, fail: &Fail) {
        (self.0)(req, res, fail)
    }
}

// ── Composition ───────────────────────────────────────────────────────────────

/// Several handlers run in order against the same request and response.
///
/// A failure reported by one child never stops the children after it.
pub struct Combined {
    handlers: Vec<BoxedHandler>,
}

impl Combined {
    pub fn new(handlers: Vec<BoxedHandler>) -> Self {
        Self { handlers }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Handler for Combined {
    fn call(&self, req: &Request, res: &mut ResponseWriter, fail: &Fail) {
        for handler in &self.handlers {
            handler.call(req, res, fail);
        }
    }
}

/// Sequences already-boxed handlers into one. See also [`combine!`](crate::combine).
pub fn combine_handlers(handlers: Vec<BoxedHandler>) -> Combined {
    Combined::new(handlers)
}

/// Sequences handlers of any type into one [`Combined`] handler.
///
/// ```rust
/// use fakeserve::{combine, respond_with, verify_request};
/// use http::{Method, StatusCode};
///
/// let handler = combine!(
///     verify_request(Method::POST, "/foo"),
///     respond_with(StatusCode::CREATED, "sweet"),
/// );
/// assert_eq!(handler.len(), 2);
/// ```
#[macro_export]
macro_rules! combine {
    ($($handler:expr),* $(,)?) => {
        $crate::Combined::new(vec![$($crate::Handler::into_boxed_handler($handler)),*])
    };
}

/// The replacement installed by [`HandlerQueue::wrap`](crate::HandlerQueue::wrap):
/// `extra` runs first, then the handler that previously held the slot.
pub struct Wrapped {
    extra: BoxedHandler,
    inner: BoxedHandler,
}

impl Wrapped {
    pub fn new(extra: BoxedHandler, inner: BoxedHandler) -> Self {
        Self { extra, inner }
    }
}

impl Handler for Wrapped {
    fn call(&self, req: &Request, res: &mut ResponseWriter, fail: &Fail) {
        self.extra.call(req, res, fail);
        self.inner.call(req, res, fail);
    }
}
