//! Failure reporting.
//!
//! Verification primitives and the unhandled-request policy never abort a
//! dispatch. They report what went wrong through a [`FailHandler`] and let
//! the rest of the handler chain run. The server holds exactly one handler,
//! injected at construction, so two servers in the same test binary never
//! share failure state.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error};

/// Receives every violation detected while serving a request.
///
/// `caller_skip` mirrors the stack-depth hint some test frameworks accept;
/// fakeserve's own primitives always pass `None`.
///
/// An implementation may panic to abort the running handler. The panic is
/// contained by the dispatcher and the violation counts as reported once.
///
/// It runs with the server's dispatch lock held, so it must not call back
/// into the [`Server`](crate::Server) (e.g. `received_requests()`): the lock
/// is not reentrant and the call would deadlock.
pub trait FailHandler: Send + Sync + 'static {
    fn fail(&self, message: &str, caller_skip: Option<usize>);
}

impl<F> FailHandler for F
where
    F: Fn(&str, Option<usize>) + Send + Sync + 'static,
{
    fn fail(&self, message: &str, caller_skip: Option<usize>) {
        self(message, caller_skip)
    }
}

/// Handle to the failure collaborator, passed to every [`Handler`](crate::Handler) call.
#[derive(Clone)]
pub struct Fail(Arc<dyn FailHandler>);

impl Fail {
    pub fn new(handler: impl FailHandler) -> Self {
        Self(Arc::new(handler))
    }

    pub(crate) fn from_arc(handler: Arc<dyn FailHandler>) -> Self {
        Self(handler)
    }

    /// Reports one failure.
    pub fn fail(&self, message: impl AsRef<str>) {
        self.report(message.as_ref(), None);
    }

    pub fn fail_with_skip(&self, message: impl AsRef<str>, caller_skip: usize) {
        self.report(message.as_ref(), Some(caller_skip));
    }

    // A panicking collaborator keeps unwinding, tagged so the dispatcher
    // knows the failure has already been delivered.
    fn report(&self, message: &str, caller_skip: Option<usize>) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| self.0.fail(message, caller_skip))) {
            resume_unwind(Box::new(Reported(payload)));
        }
    }

    /// Reports a failure raised outside any handler. A panic from the
    /// collaborator ends here instead of unwinding through the server.
    pub(crate) fn fail_contained(&self, message: &str) {
        if catch_unwind(AssertUnwindSafe(|| self.0.fail(message, None))).is_err() {
            debug!(%message, "failure handler panicked after receiving report");
        }
    }
}

/// Panic payload of a collaborator that panicked while receiving a report.
pub(crate) struct Reported(pub(crate) Box<dyn Any + Send>);

impl Reported {
    pub(crate) fn is_reported(payload: &(dyn Any + Send)) -> bool {
        payload.is::<Reported>()
    }
}

/// Records each report, then panics with it, the way assertion-based test
/// frameworks deliver failures.
#[cfg(test)]
pub(crate) struct PanicAfterLog(pub(crate) FailureLog);

#[cfg(test)]
impl FailHandler for PanicAfterLog {
    fn fail(&self, message: &str, caller_skip: Option<usize>) {
        self.0.fail(message, caller_skip);
        panic!("{message}");
    }
}

impl std::fmt::Debug for Fail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Fail(..)")
    }
}

/// In-memory failure recorder.
///
/// This is the collaborator a [`Server`](crate::Server) uses when none is
/// configured. Clones share the same log, so a test can keep one clone and
/// hand another to the server.
#[derive(Clone, Debug, Default)]
pub struct FailureLog {
    messages: Arc<Mutex<Vec<String>>>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every failure recorded so far, in report order.
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl FailHandler for FailureLog {
    fn fail(&self, message: &str, _caller_skip: Option<usize>) {
        error!(%message, "fake server failure");
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_owned());
    }
}
