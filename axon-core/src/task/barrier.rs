/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::task::{Future, Promise, Timeout};

/// Error text of [`wait_for_first`] when no input future produced a value.
pub(crate) const ERR_NO_WINNER: &str = "No future finished with a value";

/// An N-way rendezvous over futures.
///
/// Futures are added while the barrier is *open*; the first call to [`future()`][Self::future]
/// closes it and returns a future over the full set, which completes once every added future is
/// terminal. The element futures are handed back untouched, so callers inspect value/error per
/// element.
pub struct FutureBarrier<T> {
    inner: Arc<BarrierInner<T>>,
}

struct BarrierInner<T> {
    state: Mutex<BarrierState<T>>,
    promise: Promise<Vec<Future<T>>>,
}

struct BarrierState<T> {
    futures: Vec<Future<T>>,
    pending: usize,
    closed: bool,
    fired: bool,
}

impl<T> Default for FutureBarrier<T>
where
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FutureBarrier<T>
where
    T: Send + 'static,
{
    pub fn new() -> Self {
        FutureBarrier {
            inner: Arc::new(BarrierInner {
                state: Mutex::new(BarrierState {
                    futures: Vec::new(),
                    pending: 0,
                    closed: false,
                    fired: false,
                }),
                promise: Promise::new(),
            }),
        }
    }

    /// Adds a future to the barrier. Returns `false` once the barrier is closed, in which case
    /// the future was not added.
    pub fn add_future(&self, future: Future<T>) -> bool {
        {
            let mut state = self.inner.state.lock().unwrap();
            if state.closed {
                return false;
            }
            state.futures.push(future.clone());
            state.pending += 1;
        }

        let inner = self.inner.clone();
        future.connect(move |_done| {
            let set = {
                let mut state = inner.state.lock().unwrap();
                state.pending -= 1;
                if state.closed && state.pending == 0 && !state.fired {
                    state.fired = true;
                    Some(state.futures.clone())
                } else {
                    None
                }
            };
            if let Some(futures) = set {
                inner.promise.set_value(futures);
            }
        });
        true
    }

    /// Closes the barrier and returns the rendezvous future.
    ///
    /// Completes when every added future is terminal; immediately if none was added. Subsequent
    /// calls return the same future.
    pub fn future(&self) -> Future<Vec<Future<T>>> {
        let result = self.inner.promise.future();
        let set = {
            let mut state = self.inner.state.lock().unwrap();
            state.closed = true;
            if state.pending == 0 && !state.fired {
                state.fired = true;
                Some(state.futures.clone())
            } else {
                None
            }
        };
        if let Some(futures) = set {
            self.inner.promise.set_value(futures);
        }
        result
    }
}

/// Blocks until every future in `futures` is terminal. Idempotent: calling it again returns
/// immediately.
pub fn wait_for_all<T>(futures: &[Future<T>])
where
    T: Send + 'static,
{
    for future in futures {
        future.wait(Timeout::Infinite);
    }
}

/// Returns a future resolving to the value of the first input reaching `FinishedWithValue`.
///
/// When every input ends in error or cancellation (or `futures` is empty), the result fails
/// with `"No future finished with a value"`.
pub fn wait_for_first<T>(futures: &[Future<T>]) -> Future<T>
where
    T: Clone + Send + 'static,
{
    let promise = Promise::new();
    let result = promise.future();
    if futures.is_empty() {
        promise.set_error(ERR_NO_WINNER);
        return result;
    }

    let claimed = Arc::new(AtomicBool::new(false));
    let remaining = Arc::new(AtomicUsize::new(futures.len()));
    for future in futures {
        let promise = promise.clone();
        let claimed = claimed.clone();
        let remaining = remaining.clone();
        future.connect(move |done| {
            if done.has_value(Timeout::None) == Ok(true)
                && !claimed.swap(true, Ordering::SeqCst)
            {
                // Terminal with a value; the clone cannot fail.
                if let Ok(value) = done.value(Timeout::None) {
                    promise.set_value(value);
                }
            }
            // The winner decrements only after claiming, so the last decrementer observes
            // `claimed` in its final state.
            if remaining.fetch_sub(1, Ordering::SeqCst) == 1 && !claimed.load(Ordering::SeqCst) {
                promise.set_error(ERR_NO_WINNER);
            }
        });
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::FutureState;

    #[test]
    fn barrier_without_futures_completes_immediately() {
        let barrier: FutureBarrier<i32> = FutureBarrier::new();
        let done = barrier.future();
        assert_eq!(done.state(), FutureState::FinishedWithValue);
        assert!(done.value(Timeout::None).unwrap().is_empty());
    }

    #[test]
    fn add_after_close_is_rejected() {
        let barrier: FutureBarrier<i32> = FutureBarrier::new();
        let promise = Promise::new();
        assert!(barrier.add_future(promise.future()));
        let _done = barrier.future();
        assert!(!barrier.add_future(promise.future()));
        promise.set_value(1);
    }

    #[test]
    fn barrier_completes_when_all_added_are_terminal() {
        let barrier = FutureBarrier::new();
        let promises: Vec<Promise<i32>> = (0..4).map(|_| Promise::new()).collect();
        for promise in &promises {
            assert!(barrier.add_future(promise.future()));
        }

        let done = barrier.future();
        promises[0].set_value(0);
        promises[1].set_error("nope");
        promises[2].set_value(2);
        assert_eq!(done.state(), FutureState::Running);

        promises[3].set_value(3);
        let elements = done.value(Timeout::Infinite).unwrap();
        assert_eq!(elements.len(), 4);
        assert_eq!(elements[2].value(Timeout::None), Ok(2));
        assert_eq!(elements[1].error_message(Timeout::None).as_deref(), Some("nope"));
    }

    #[test]
    fn wait_for_first_prefers_the_value() {
        let promises: Vec<Promise<i32>> = (0..3).map(|_| Promise::new()).collect();
        let futures: Vec<_> = promises.iter().map(|p| p.future()).collect();

        let first = wait_for_first(&futures);
        promises[0].set_error("a");
        promises[1].set_value(7);
        promises[2].set_error("c");
        assert_eq!(first.value(Timeout::Infinite), Ok(7));
    }

    #[test]
    fn wait_for_first_with_all_failures_errors_out() {
        let promises: Vec<Promise<i32>> = (0..3).map(|_| Promise::new()).collect();
        let futures: Vec<_> = promises.iter().map(|p| p.future()).collect();

        let first = wait_for_first(&futures);
        for promise in &promises {
            promise.set_error("boom");
        }
        assert_eq!(
            first.error_message(Timeout::Infinite).as_deref(),
            Some(ERR_NO_WINNER)
        );
    }

    #[test]
    fn wait_for_first_of_nothing_errors_out() {
        let first: Future<i32> = wait_for_first(&[]);
        assert_eq!(
            first.error_message(Timeout::None).as_deref(),
            Some(ERR_NO_WINNER)
        );
    }
}
