//! The fake server: listener, connection tasks and the public test surface.
//!
//! # Lifecycle
//!
//! [`Server::start`] binds an ephemeral port on `127.0.0.1` and spawns the
//! accept loop on the current tokio runtime. Every connection gets its own
//! task, and every request on it funnels into the one [`Dispatcher`] behind a
//! mutex, so concurrent requests still see strictly positional handlers.
//!
//! [`Server::close`] (or dropping the server) stops the accept loop and
//! aborts any connection still open. A test builds one server per case and
//! closes it at teardown.

use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::dispatch::Dispatcher;
use crate::error::Error;
use crate::fail::{Fail, FailHandler, FailureLog};
use crate::handler::{BoxedHandler, Handler};
use crate::request::Request;

// ── Configuration ─────────────────────────────────────────────────────────────

/// Configures a [`Server`] before it starts listening.
///
/// ```rust,no_run
/// # async fn run() -> Result<(), fakeserve::Error> {
/// use fakeserve::Server;
/// use http::StatusCode;
///
/// let server = Server::builder()
///     .allow_unhandled_requests(true)
///     .unhandled_status(StatusCode::FORBIDDEN)
///     .start()
///     .await?;
/// # server.close().await;
/// # Ok(())
/// # }
/// ```
pub struct ServerBuilder {
    addr: SocketAddr,
    allow_unhandled: bool,
    unhandled_status: StatusCode,
    fail_handler: Option<Arc<dyn FailHandler>>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            allow_unhandled: false,
            unhandled_status: StatusCode::INTERNAL_SERVER_ERROR,
            fail_handler: None,
        }
    }

    /// Address to listen on. Defaults to `127.0.0.1:0` (any free port).
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    /// Answer requests beyond the last handler instead of reporting them.
    pub fn allow_unhandled_requests(mut self, allow: bool) -> Self {
        self.allow_unhandled = allow;
        self
    }

    /// Status used for allowed unhandled requests. Defaults to `500`.
    pub fn unhandled_status(mut self, status: StatusCode) -> Self {
        self.unhandled_status = status;
        self
    }

    /// Where failures go. Without one they land in [`Server::failures`].
    pub fn fail_handler(mut self, handler: impl FailHandler) -> Self {
        self.fail_handler = Some(Arc::new(handler));
        self
    }

    /// Binds the listener and starts serving on the current tokio runtime.
    pub async fn start(self) -> Result<Server, Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let addr = listener.local_addr()?;

        let failures = FailureLog::new();
        let fail = match self.fail_handler {
            Some(handler) => Fail::from_arc(handler),
            None => Fail::new(failures.clone()),
        };
        let shared = Arc::new(Shared {
            dispatcher: Mutex::new(Dispatcher::new(self.allow_unhandled, self.unhandled_status)),
            fail,
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(accept_loop(listener, Arc::clone(&shared), shutdown_rx));

        info!(%addr, "fake server listening");
        Ok(Server {
            addr,
            shared,
            failures,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

// ── Server ────────────────────────────────────────────────────────────────────

struct Shared {
    dispatcher: Mutex<Dispatcher>,
    fail: Fail,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Dispatcher> {
        self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An in-process HTTP server that serves its handlers strictly in order.
///
/// ```rust,no_run
/// # async fn run() -> Result<(), fakeserve::Error> {
/// use fakeserve::{combine, respond_with, verify_request, Server};
/// use http::{Method, StatusCode};
///
/// let server = Server::start().await?;
/// server.append_handler(combine!(
///     verify_request(Method::GET, "/users/42"),
///     respond_with(StatusCode::OK, r#"{"id":42}"#),
/// ));
///
/// // point the client under test at server.url() ...
///
/// assert!(server.failures().is_empty());
/// server.close().await;
/// # Ok(())
/// # }
/// ```
pub struct Server {
    addr: SocketAddr,
    shared: Arc<Shared>,
    failures: FailureLog,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Server {
    /// Starts a server with the default configuration.
    pub async fn start() -> Result<Self, Error> {
        Self::builder().start().await
    }

    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL without a trailing slash, e.g. `http://127.0.0.1:49152`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stops accepting connections, aborts open ones and waits for the
    /// accept loop to finish.
    pub async fn close(mut self) {
        self.signal_shutdown();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("fake server task failed: {e}");
            }
        }
    }

    fn signal_shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    // ── Handlers ──────────────────────────────────────────────────────────────

    /// Queues a handler for the next request without one.
    pub fn append_handler(&self, handler: impl Handler) {
        self.shared.lock().handlers.append(handler);
    }

    /// Queues several handlers, one per upcoming request, in order.
    pub fn append_handlers(&self, handlers: Vec<BoxedHandler>) {
        self.shared.lock().handlers.extend(handlers);
    }

    /// Replaces the handler at `index`, or fills the next free slot when
    /// `index == handler_count()`.
    pub fn set_handler(&self, index: usize, handler: impl Handler) -> Result<(), Error> {
        self.shared.lock().handlers.set(index, handler)
    }

    /// The handler at `index`, for calling it directly.
    pub fn get_handler(&self, index: usize) -> Result<BoxedHandler, Error> {
        self.shared.lock().handlers.get(index)
    }

    /// Makes the handler at `index` run `extra` first.
    pub fn wrap_handler(&self, index: usize, extra: impl Handler) -> Result<(), Error> {
        self.shared.lock().handlers.wrap(index, extra)
    }

    pub fn handler_count(&self) -> usize {
        self.shared.lock().handlers.len()
    }

    // ── Inspection ────────────────────────────────────────────────────────────

    /// Every request received so far, in arrival order.
    pub fn received_requests(&self) -> Vec<Request> {
        self.shared.lock().received_requests().to_vec()
    }

    /// Failures recorded by the built-in log. Stays empty when a custom
    /// [`fail_handler`](ServerBuilder::fail_handler) was configured.
    pub fn failures(&self) -> &FailureLog {
        &self.failures
    }

    /// Forgets all handlers and recorded requests. Flags are kept.
    pub fn reset(&self) {
        self.shared.lock().reset();
    }

    // ── Unhandled policy ──────────────────────────────────────────────────────

    pub fn allow_unhandled_requests(&self) -> bool {
        self.shared.lock().allow_unhandled
    }

    pub fn set_allow_unhandled_requests(&self, allow: bool) {
        self.shared.lock().allow_unhandled = allow;
    }

    pub fn unhandled_status(&self) -> StatusCode {
        self.shared.lock().unhandled_status
    }

    pub fn set_unhandled_status(&self, status: StatusCode) {
        self.shared.lock().unhandled_status = status;
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.signal_shutdown();
    }
}

// ── Accept loop ───────────────────────────────────────────────────────────────

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>, mut shutdown: oneshot::Receiver<()>) {
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            // Shutdown first, so a close never races a queued accept.
            biased;

            // A dropped sender counts as a shutdown request too.
            _ = &mut shutdown => break,

            res = listener.accept() => {
                let (stream, peer) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let shared = Arc::clone(&shared);
                let io = TokioIo::new(stream);

                tasks.spawn(async move {
                    let svc = service_fn(move |req| handle(Arc::clone(&shared), req));

                    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                        .serve_connection(io, svc)
                        .await
                    {
                        debug!(%peer, "connection closed with error: {e}");
                    }
                });
            }

            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    info!(open_connections = tasks.len(), "fake server stopping");
    tasks.shutdown().await;
}

/// Buffers the body, then records and dispatches under the dispatcher lock.
async fn handle(
    shared: Arc<Shared>,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await.map(|collected| collected.to_bytes());

    let request = snapshot(parts, body, &shared.fail);
    let res = shared.lock().dispatch(request, &shared.fail);
    Ok(res.into_inner())
}

/// An unreadable body is reported and recorded as empty, so the request
/// still takes its place in the arrival order.
fn snapshot<E: fmt::Display>(parts: http::request::Parts, body: Result<Bytes, E>, fail: &Fail) -> Request {
    let body = body.unwrap_or_else(|e| {
        warn!(method = %parts.method, uri = %parts.uri, "failed to read request body: {e}");
        fail.fail_contained(&format!("Failed to read request body of {} {}: {e}", parts.method, parts.uri));
        Bytes::new()
    });
    Request::new(parts.method, parts.uri, parts.headers, body)
}
