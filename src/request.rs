//! Turns callback-driven requests (adapter, device) into calls that straight-line
//! setup code can wait on.
//!
//! A request is issued with a [`Completion`], the callback half of a
//! [`RequestSlot`]. Native hosts wait by pumping pending work until the slot is
//! completed; cooperative hosts (the browser) await the slot instead.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// Why a request resolved without a handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The backend reported a failure.
    Failed(String),
    /// The completion was dropped before anyone resolved it.
    Abandoned,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Failed(message) => write!(f, "{message}"),
            RequestError::Abandoned => write!(f, "request was dropped before completing"),
        }
    }
}

impl std::error::Error for RequestError {}

/// Advances asynchronous work that a pending request depends on.
///
/// Native backends have no implicit event loop, so someone has to drive it.
pub trait PendingWork {
    fn pump(&mut self);
}

struct RequestState<T> {
    outcome: Option<Result<T, RequestError>>,
    completed: bool,
    waker: Option<Waker>,
}

impl<T> RequestState<T> {
    fn complete(&mut self, outcome: Result<T, RequestError>) {
        if self.completed {
            return;
        }
        self.outcome = Some(outcome);
        self.completed = true;
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }
}

/// Holds the result of one in-flight request.
pub struct RequestSlot<T> {
    kind: &'static str,
    state: Rc<RefCell<RequestState<T>>>,
}

impl<T> RequestSlot<T> {
    /// `kind` names the requested object in log output ("adapter", "device").
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            state: Rc::new(RefCell::new(RequestState {
                outcome: None,
                completed: false,
                waker: None,
            })),
        }
    }

    /// Returns the callback half. Only the first resolution is kept.
    pub fn completion(&self) -> Completion<T> {
        Completion {
            state: Some(Rc::clone(&self.state)),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state.borrow().completed
    }

    /// Pumps `work` until the request resolves.
    ///
    /// There is no timeout: a request that never resolves blocks forever.
    pub fn wait<W>(self, work: &mut W) -> Option<T>
    where
        W: PendingWork + ?Sized,
    {
        while !self.is_completed() {
            work.pump();
        }
        self.finish()
    }

    fn finish(self) -> Option<T> {
        let outcome = self.state.borrow_mut().outcome.take();
        report(self.kind, outcome)
    }
}

impl<T> Future for RequestSlot<T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.state.borrow_mut();
        if !state.completed {
            state.waker = Some(cx.waker().clone());
            return Poll::Pending;
        }
        let outcome = state.outcome.take();
        drop(state);
        Poll::Ready(report(self.kind, outcome))
    }
}

fn report<T>(kind: &str, outcome: Option<Result<T, RequestError>>) -> Option<T> {
    match outcome {
        Some(Ok(value)) => {
            log::info!("Got {kind}");
            Some(value)
        }
        Some(Err(err)) => {
            log::error!("Could not get {kind}: {err}");
            None
        }
        // Already taken by an earlier poll.
        None => None,
    }
}

/// Callback half of a [`RequestSlot`].
///
/// Dropping it without resolving marks the request as [`RequestError::Abandoned`].
pub struct Completion<T> {
    state: Option<Rc<RefCell<RequestState<T>>>>,
}

impl<T> Completion<T> {
    pub fn succeed(self, value: T) {
        self.finish(Ok(value));
    }

    pub fn fail(self, message: impl Into<String>) {
        self.finish(Err(RequestError::Failed(message.into())));
    }

    pub fn resolve(self, outcome: Result<T, String>) {
        self.finish(outcome.map_err(RequestError::Failed));
    }

    fn finish(mut self, outcome: Result<T, RequestError>) {
        if let Some(state) = self.state.take() {
            state.borrow_mut().complete(outcome);
        }
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            state.borrow_mut().complete(Err(RequestError::Abandoned));
        }
    }
}

/// Issues a request and blocks until it resolves.
///
/// `issue` receives the pending-work driver so it can hand the request over to
/// it, and the completion that the request must eventually resolve.
pub fn request_sync<T, W>(
    work: &mut W,
    kind: &'static str,
    issue: impl FnOnce(&mut W, Completion<T>),
) -> Option<T>
where
    W: PendingWork + ?Sized,
{
    log::info!("Requesting {kind}...");
    let slot = RequestSlot::new(kind);
    issue(work, slot.completion());
    slot.wait(work)
}

/// Issues a request and yields to the host until it resolves.
pub fn request_cooperative<T>(
    kind: &'static str,
    issue: impl FnOnce(Completion<T>),
) -> RequestSlot<T> {
    log::info!("Requesting {kind}...");
    let slot = RequestSlot::new(kind);
    issue(slot.completion());
    slot
}
