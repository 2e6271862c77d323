/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::error::Error;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::task::EventLoop;

/// Observable state of a [`Future`].
///
/// `None` is the state of a future that was never linked to a promise. All other states are
/// driven by the promise side; once a terminal state is reached it is sticky until
/// [`Promise::reset()`] is called.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FutureState {
    /// Never linked to a promise.
    None,
    /// Linked to a promise which has not delivered a result yet.
    Running,
    FinishedWithValue,
    FinishedWithError,
    Canceled,
}

impl FutureState {
    /// Whether the state is one of the three terminal states.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FutureState::FinishedWithValue | FutureState::FinishedWithError | FutureState::Canceled
        )
    }
}

/// Wait budget for the blocking accessors.
///
/// All waits in the runtime take microsecond-granularity timeouts. `None` never blocks,
/// `Infinite` blocks until a terminal state is reached.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Timeout {
    /// Return immediately with the current state.
    None,
    /// Block until the future is terminal.
    Infinite,
    /// Block for at most this many microseconds.
    Micros(u64),
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Timeout::Micros(d.as_micros().min(u64::MAX as u128) as u64)
    }
}

/// Error returned by the fallible accessors of [`Future`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FutureError {
    /// The promise side reported an error; carries its message verbatim.
    User(String),
    /// The future ended in the canceled state.
    Canceled,
    /// The wait budget elapsed before the future became terminal.
    Timeout,
    /// [`Future::cancel()`] was called but the promise has no cancel callback.
    NotCanceleable,
}

impl fmt::Display for FutureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Re-raised verbatim, as the transport relies on the exact text.
            FutureError::User(msg) => write!(f, "{msg}"),
            FutureError::Canceled => write!(f, "future was canceled"),
            FutureError::Timeout => write!(f, "future was not ready within the wait budget"),
            FutureError::NotCanceleable => write!(f, "future is not canceleable"),
        }
    }
}

impl Error for FutureError {}

type Continuation<T> = Box<dyn FnOnce(Future<T>) + Send>;
type CancelCallback<T> = Arc<dyn Fn(Promise<T>) + Send + Sync>;

struct Inner<T> {
    state: FutureState,
    value: Option<T>,
    error: Option<String>,
    continuations: Vec<Continuation<T>>,
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    done: Condvar,
    // Fixed at construction; never behind the mutex.
    cancel_cb: Option<CancelCallback<T>>,
}

impl<T> Shared<T> {
    fn new(initial: FutureState, cancel_cb: Option<CancelCallback<T>>) -> Arc<Self> {
        Arc::new(Shared {
            inner: Mutex::new(Inner {
                state: initial,
                value: None,
                error: None,
                continuations: Vec::new(),
            }),
            done: Condvar::new(),
            cancel_cb,
        })
    }
}

/// Write side of a single-assignment asynchronous cell.
///
/// The shared state is reference-counted; clones of a promise all drive the same cell.
/// A promise may carry a *cancel callback*, registered with [`Promise::with_cancel_callback()`],
/// which makes all linked futures canceleable.
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Promise {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Default for Promise<T>
where
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Promise<T>
where
    T: Send + 'static,
{
    pub fn new() -> Self {
        Promise {
            shared: Shared::new(FutureState::None, None),
        }
    }

    /// Creates a promise whose futures are canceleable.
    ///
    /// [`Future::cancel()`] invokes `cancel_cb` with a promise sharing this state. The callback
    /// chooses the terminal state (value, error, canceled) -- or none at all, which leaves the
    /// future running. Resolution may also happen later, from another thread.
    pub fn with_cancel_callback<F>(cancel_cb: F) -> Self
    where
        F: Fn(Promise<T>) + Send + Sync + 'static,
    {
        Promise {
            shared: Shared::new(FutureState::None, Some(Arc::new(cancel_cb))),
        }
    }

    /// Returns a future sharing this promise's state.
    ///
    /// The first access moves a pristine cell from `None` to `Running`.
    pub fn future(&self) -> Future<T> {
        {
            let mut inner = self.shared.inner.lock().unwrap();
            if inner.state == FutureState::None {
                inner.state = FutureState::Running;
            }
        }
        Future {
            shared: self.shared.clone(),
        }
    }

    /// Settles the cell with a value.
    ///
    /// # Panics
    /// If the cell is already settled and [`reset()`][Self::reset] has not been called since.
    pub fn set_value(&self, value: T) {
        self.settle(FutureState::FinishedWithValue, Some(value), None);
    }

    /// Settles the cell with an error message.
    ///
    /// # Panics
    /// If the cell is already settled and [`reset()`][Self::reset] has not been called since.
    pub fn set_error(&self, error: impl Into<String>) {
        self.settle(FutureState::FinishedWithError, None, Some(error.into()));
    }

    /// Settles the cell as canceled.
    ///
    /// # Panics
    /// If the cell is already settled and [`reset()`][Self::reset] has not been called since.
    pub fn set_canceled(&self) {
        self.settle(FutureState::Canceled, None, None);
    }

    /// Returns the cell to `Running`, discarding any stored value or error.
    ///
    /// Continuations registered before the reset but not yet fired (the cell was still running)
    /// stay registered and fire on the next settlement.
    pub fn reset(&self) {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.state = FutureState::Running;
        inner.value = None;
        inner.error = None;
    }

    fn settle(&self, state: FutureState, value: Option<T>, error: Option<String>) {
        let continuations = {
            let mut inner = self.shared.inner.lock().unwrap();
            if inner.state.is_terminal() {
                panic!("promise is already settled; call reset() before setting a new result");
            }
            inner.state = state;
            inner.value = value;
            inner.error = error;
            self.shared.done.notify_all();
            std::mem::take(&mut inner.continuations)
        };

        // Continuations run outside the lock, on the settling thread, in registration order.
        for continuation in continuations {
            continuation(self.future());
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.inner.lock().unwrap().state;
        f.debug_struct("Promise").field("state", &state).finish()
    }
}

/// Read handle to a single-assignment asynchronous cell.
///
/// Handles are cheap to clone; all clones observe the same cell. A default-constructed future
/// was never linked to a promise and stays in [`FutureState::None`] forever.
pub struct Future<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Future {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Default for Future<T>
where
    T: Send + 'static,
{
    fn default() -> Self {
        Self::unbound()
    }
}

impl<T> Future<T>
where
    T: Send + 'static,
{
    /// A future that is not backed by any promise; its state is `None` and never changes.
    pub fn unbound() -> Self {
        Future {
            shared: Shared::new(FutureState::None, None),
        }
    }

    /// An already-finished future holding `value`.
    pub fn from_value(value: T) -> Self {
        let promise = Promise::new();
        let future = promise.future();
        promise.set_value(value);
        future
    }

    /// An already-failed future carrying `error`.
    pub fn from_error(error: impl Into<String>) -> Self {
        let promise = Promise::new();
        let future = promise.future();
        promise.set_error(error);
        future
    }

    /// Current state, without blocking.
    pub fn state(&self) -> FutureState {
        self.shared.inner.lock().unwrap().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == FutureState::Running
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn is_canceled(&self) -> bool {
        self.state() == FutureState::Canceled
    }

    /// Whether [`cancel()`][Self::cancel] can do anything, i.e. the backing promise was
    /// constructed with a cancel callback.
    pub fn is_canceleable(&self) -> bool {
        self.shared.cancel_cb.is_some()
    }

    /// Waits for at most `timeout` and returns the state observed afterwards.
    ///
    /// Waiting on a never-linked future returns [`FutureState::None`] immediately: with no
    /// promise attached, no transition can ever happen.
    pub fn wait(&self, timeout: Timeout) -> FutureState {
        let mut inner = self.shared.inner.lock().unwrap();
        if inner.state != FutureState::Running {
            return inner.state;
        }
        match timeout {
            Timeout::None => inner.state,
            Timeout::Infinite => {
                while inner.state == FutureState::Running {
                    inner = self.shared.done.wait(inner).unwrap();
                }
                inner.state
            }
            Timeout::Micros(us) => {
                let deadline = Instant::now() + Duration::from_micros(us);
                while inner.state == FutureState::Running {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    let (guard, _) = self
                        .shared
                        .done
                        .wait_timeout(inner, deadline - now)
                        .unwrap();
                    inner = guard;
                }
                inner.state
            }
        }
    }

    /// Waits, then returns a clone of the value.
    ///
    /// Fails with [`FutureError::User`] (carrying the promise's error message verbatim) on the
    /// error state, [`FutureError::Canceled`] on cancellation and [`FutureError::Timeout`] when
    /// the future is still running after the wait.
    pub fn value(&self, timeout: Timeout) -> Result<T, FutureError>
    where
        T: Clone,
    {
        match self.wait(timeout) {
            FutureState::FinishedWithValue => {
                let inner = self.shared.inner.lock().unwrap();
                // The state flips under the same lock that stores the value.
                Ok(inner.value.as_ref().expect("value state without value").clone())
            }
            FutureState::FinishedWithError => {
                let inner = self.shared.inner.lock().unwrap();
                Err(FutureError::User(
                    inner.error.clone().unwrap_or_default(),
                ))
            }
            FutureState::Canceled => Err(FutureError::Canceled),
            FutureState::Running | FutureState::None => Err(FutureError::Timeout),
        }
    }

    /// Waits, then returns the error message if the future ended in the error state.
    pub fn error_message(&self, timeout: Timeout) -> Option<String> {
        match self.wait(timeout) {
            FutureState::FinishedWithError => {
                let inner = self.shared.inner.lock().unwrap();
                inner.error.clone()
            }
            _ => None,
        }
    }

    /// Waits, then reports whether the future holds a value.
    ///
    /// Fails with [`FutureError::Timeout`] when the future is still running after the wait,
    /// so a non-blocking probe (`Timeout::None`) on a pending future is an error, not `false`.
    pub fn has_value(&self, timeout: Timeout) -> Result<bool, FutureError> {
        match self.wait(timeout) {
            FutureState::Running | FutureState::None => Err(FutureError::Timeout),
            state => Ok(state == FutureState::FinishedWithValue),
        }
    }

    /// Waits, then reports whether the future holds an error. Same timeout contract as
    /// [`has_value()`][Self::has_value].
    pub fn has_error(&self, timeout: Timeout) -> Result<bool, FutureError> {
        match self.wait(timeout) {
            FutureState::Running | FutureState::None => Err(FutureError::Timeout),
            state => Ok(state == FutureState::FinishedWithError),
        }
    }

    /// Requests cooperative cancellation.
    ///
    /// Invokes the promise's cancel callback and returns immediately; the callback decides the
    /// terminal state, possibly later or not at all. Fails with [`FutureError::NotCanceleable`]
    /// when the promise has no cancel callback.
    pub fn cancel(&self) -> Result<(), FutureError> {
        let cb = self
            .shared
            .cancel_cb
            .clone()
            .ok_or(FutureError::NotCanceleable)?;
        cb(Promise {
            shared: self.shared.clone(),
        });
        Ok(())
    }

    /// Registers a continuation that runs exactly once when the future is terminal.
    ///
    /// If the future is already terminal the continuation runs immediately on the calling
    /// thread; otherwise it runs on the thread that settles the promise. The continuation
    /// always observes the fully-formed terminal state.
    pub fn connect<F>(&self, continuation: F)
    where
        F: FnOnce(Future<T>) + Send + 'static,
    {
        {
            let mut inner = self.shared.inner.lock().unwrap();
            if !inner.state.is_terminal() {
                inner.continuations.push(Box::new(continuation));
                return;
            }
        }
        continuation(self.clone());
    }

    /// Like [`connect()`][Self::connect], but posts the continuation to `target` instead of
    /// running it on the settling thread.
    pub fn connect_on<F>(&self, target: &EventLoop, continuation: F)
    where
        F: FnOnce(Future<T>) + Send + 'static,
    {
        let target = target.clone();
        self.connect(move |future| {
            target.post(move || continuation(future));
        });
    }

    /// Wraps this future in a [`FutureSync`][crate::task::FutureSync], making it block on drop
    /// unless observed.
    pub fn sync(&self) -> crate::task::FutureSync<T> {
        crate::task::FutureSync::from(self.clone())
    }
}

// No T: Debug bound; only the state is interesting.
impl<T> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.inner.lock().unwrap().state;
        f.debug_struct("Future").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pristine_promise_starts_running_on_first_future() {
        let promise: Promise<i32> = Promise::new();
        let future = promise.future();
        assert_eq!(future.state(), FutureState::Running);
        assert!(!future.is_finished());
    }

    #[test]
    fn unbound_future_stays_none() {
        let future: Future<i32> = Future::unbound();
        assert_eq!(future.state(), FutureState::None);
        assert_eq!(future.wait(Timeout::None), FutureState::None);
        assert_eq!(future.wait(Timeout::Infinite), FutureState::None);
        assert!(!future.is_canceleable());
    }

    #[test]
    fn value_flows_to_continuation() {
        let promise = Promise::new();
        let future = promise.future();

        let (tx, rx) = std::sync::mpsc::channel();
        future.connect(move |f| {
            tx.send(f.value(Timeout::None)).unwrap();
        });

        promise.set_value(42);
        assert_eq!(rx.recv().unwrap(), Ok(42));
        assert_eq!(future.value(Timeout::None), Ok(42));
    }

    #[test]
    fn continuation_on_already_terminal_future_runs_inline() {
        let promise = Promise::new();
        promise.set_value("done".to_string());

        let mut seen = None;
        let (tx, rx) = std::sync::mpsc::channel();
        promise.future().connect(move |f| {
            tx.send(f.value(Timeout::None).unwrap()).unwrap();
        });
        if let Ok(v) = rx.try_recv() {
            seen = Some(v);
        }
        assert_eq!(seen.as_deref(), Some("done"));
    }

    #[test]
    fn error_is_reraised_verbatim() {
        let promise: Promise<i32> = Promise::new();
        let future = promise.future();
        promise.set_error("chiche");

        assert_eq!(future.wait(Timeout::None), FutureState::FinishedWithError);
        assert_eq!(future.has_error(Timeout::None), Ok(true));
        assert_eq!(future.error_message(Timeout::None).as_deref(), Some("chiche"));

        let err = future.value(Timeout::None).unwrap_err();
        assert_eq!(err, FutureError::User("chiche".into()));
        assert_eq!(err.to_string(), "chiche");
    }

    #[test]
    fn wait_times_out_while_running() {
        let promise: Promise<i32> = Promise::new();
        let future = promise.future();
        assert_eq!(future.wait(Timeout::Micros(20_000)), FutureState::Running);
        assert_eq!(future.value(Timeout::None), Err(FutureError::Timeout));
    }

    #[test]
    #[should_panic(expected = "already settled")]
    fn double_set_panics() {
        let promise: Promise<i32> = Promise::new();
        let _future = promise.future();
        promise.set_value(0);
        promise.reset();
        promise.set_error("");
        promise.reset();
        promise.set_value(1);
        promise.set_value(0);
    }

    #[test]
    fn reset_yields_fresh_running_future() {
        let promise: Promise<i32> = Promise::new();
        let future = promise.future();
        promise.set_value(7);
        assert_eq!(future.state(), FutureState::FinishedWithValue);

        promise.reset();
        assert_eq!(future.state(), FutureState::Running);
        assert_eq!(future.error_message(Timeout::None), None);

        promise.set_error("later");
        assert_eq!(future.error_message(Timeout::None).as_deref(), Some("later"));
    }

    #[test]
    fn cancel_without_callback_is_rejected() {
        let promise: Promise<i32> = Promise::new();
        let future = promise.future();
        assert_eq!(future.cancel(), Err(FutureError::NotCanceleable));
        assert!(future.is_running());
    }

    #[test]
    fn cancel_callback_chooses_terminal_state() {
        let promise = Promise::with_cancel_callback(|p: Promise<i32>| p.set_canceled());
        let future = promise.future();
        assert!(future.is_canceleable());

        future.cancel().unwrap();
        assert!(future.is_canceled());
        assert_eq!(future.value(Timeout::None), Err(FutureError::Canceled));
    }
}
