//! # fakeserve
//!
//! An in-process fake HTTP server for test suites. You script it with an
//! ordered queue of handlers, point the client under test at its URL, and
//! it checks that the client sent the requests you expected, in the order
//! you expected, while replying with canned responses.
//!
//! ## The contract
//!
//! Handler `N` serves the `N`-th request the server receives (zero-based)
//! and nothing else. There is no routing: a request that arrives out of
//! order meets the wrong handler, and the handler's checks say so.
//!
//! - **Verification primitives** ([`verify_request`], [`verify_json`], …)
//!   report mismatches through a [`FailHandler`] and never stop dispatch.
//! - **Response primitives** ([`respond_with`], [`respond_with_slot`], …)
//!   write the reply.
//! - [`combine!`] sequences both kinds into one handler per slot.
//! - Requests beyond the last handler are reported as unhandled, or
//!   answered with a fixed status when unhandled requests are allowed.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use fakeserve::{combine, respond_with, verify_json, verify_request, Server};
//! use http::{Method, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), fakeserve::Error> {
//!     let server = Server::start().await?;
//!     server.append_handler(combine!(
//!         verify_request(Method::POST, "/users"),
//!         verify_json(r#"{"name":"alice"}"#),
//!         respond_with(StatusCode::CREATED, r#"{"id":99}"#),
//!     ));
//!
//!     // ... exercise the client under test against server.url() ...
//!
//!     assert_eq!(server.received_requests().len(), 1);
//!     assert!(server.failures().is_empty(), "{:?}", server.failures().messages());
//!     server.close().await;
//!     Ok(())
//! }
//! ```

mod dispatch;
mod error;
mod fail;
mod handler;
mod registry;
mod request;
mod respond;
mod response;
mod server;
mod slot;
mod verify;

pub use dispatch::UNHANDLED_REQUEST;
pub use error::Error;
pub use fail::{Fail, FailHandler, FailureLog};
pub use handler::{BoxedHandler, Combined, FnHandler, Handler, Wrapped, combine_handlers, handler_fn};
pub use registry::HandlerQueue;
pub use request::Request;
pub use respond::{
    RespondWith, RespondWithJson, RespondWithSlot, respond_with, respond_with_json_encoded,
    respond_with_slot,
};
pub use response::ResponseWriter;
pub use server::{Server, ServerBuilder};
pub use slot::Slot;
pub use verify::{
    VerifyBasicAuth, VerifyBody, VerifyContentType, VerifyHeader, VerifyJson, VerifyRequest,
    verify_basic_auth, verify_body, verify_content_type, verify_header, verify_json,
    verify_json_representing, verify_request,
};
