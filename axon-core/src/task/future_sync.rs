/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::cell::Cell;
use std::fmt;

use crate::task::{Future, FutureError, FutureState, Timeout};

/// A future wrapper that blocks on drop unless its result was observed.
///
/// `FutureSync` makes "fire-and-forget looks synchronous" explicit: a function returning one can
/// be used synchronously by simply ignoring the return value (the drop at the call site waits
/// for completion), or asynchronously by keeping the wrapper around and observing it.
///
/// Every observation -- [`value()`][Self::value], [`wait()`][Self::wait],
/// [`error_message()`][Self::error_message], the state probes, [`cancel()`][Self::cancel],
/// [`detach()`][Self::detach] or conversion into a plain [`Future`] -- marks the wrapper
/// *consumed*, after which dropping it no longer blocks. Cloning transfers the blocking
/// responsibility to the clone: the source is marked consumed. A wrapper converted to a plain
/// future is considered consumed forever.
///
/// The consumed flag lives in the wrapper, not in the shared state, precisely so that the
/// transfer-on-copy semantics hold per handle.
#[must_use = "dropping an unobserved FutureSync blocks until completion"]
pub struct FutureSync<T>
where
    T: Send + 'static,
{
    future: Future<T>,
    bound: bool,
    consumed: Cell<bool>,
}

impl<T> FutureSync<T>
where
    T: Send + 'static,
{
    /// A wrapper not bound to any promise; never blocks on drop and answers as a never-linked
    /// future would.
    pub fn unbound() -> Self {
        FutureSync {
            future: Future::unbound(),
            bound: false,
            consumed: Cell::new(false),
        }
    }

    fn observe(&self) -> &Future<T> {
        self.consumed.set(true);
        &self.future
    }

    pub fn state(&self) -> FutureState {
        self.observe().state()
    }

    pub fn wait(&self, timeout: Timeout) -> FutureState {
        self.observe().wait(timeout)
    }

    pub fn value(&self, timeout: Timeout) -> Result<T, FutureError>
    where
        T: Clone,
    {
        self.observe().value(timeout)
    }

    pub fn error_message(&self, timeout: Timeout) -> Option<String> {
        self.observe().error_message(timeout)
    }

    pub fn has_value(&self, timeout: Timeout) -> Result<bool, FutureError> {
        self.observe().has_value(timeout)
    }

    pub fn has_error(&self, timeout: Timeout) -> Result<bool, FutureError> {
        self.observe().has_error(timeout)
    }

    pub fn is_running(&self) -> bool {
        self.observe().is_running()
    }

    pub fn is_finished(&self) -> bool {
        self.observe().is_finished()
    }

    pub fn is_canceled(&self) -> bool {
        self.observe().is_canceled()
    }

    pub fn is_canceleable(&self) -> bool {
        self.observe().is_canceleable()
    }

    pub fn cancel(&self) -> Result<(), FutureError> {
        self.observe().cancel()
    }

    /// Gives up the synchronous contract: the wrapper is consumed and the underlying future is
    /// returned for asynchronous use. Dropping the wrapper afterwards does not block.
    pub fn detach(&self) -> Future<T> {
        self.observe().clone()
    }
}

impl<T> From<Future<T>> for FutureSync<T>
where
    T: Send + 'static,
{
    fn from(future: Future<T>) -> Self {
        FutureSync {
            future,
            bound: true,
            consumed: Cell::new(false),
        }
    }
}

impl<T> From<FutureSync<T>> for Future<T>
where
    T: Send + 'static,
{
    fn from(sync: FutureSync<T>) -> Self {
        sync.detach()
    }
}

impl<T> Clone for FutureSync<T>
where
    T: Send + 'static,
{
    /// The clone takes over the blocking responsibility; the source is marked consumed.
    fn clone(&self) -> Self {
        self.consumed.set(true);
        FutureSync {
            future: self.future.clone(),
            bound: self.bound,
            consumed: Cell::new(false),
        }
    }
}

impl<T> Drop for FutureSync<T>
where
    T: Send + 'static,
{
    fn drop(&mut self) {
        if self.bound && !self.consumed.get() {
            self.future.wait(Timeout::Infinite);
        }
    }
}

impl<T> fmt::Debug for FutureSync<T>
where
    T: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Does not go through observe(): Debug formatting is not an observation.
        f.debug_struct("FutureSync")
            .field("bound", &self.bound)
            .field("consumed", &self.consumed.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Promise;

    #[test]
    fn unbound_wrapper_does_not_block_on_drop() {
        let sync: FutureSync<i32> = FutureSync::unbound();
        assert!(!sync.is_finished());
        // Drop happens here; the test hanging would be the failure mode.
    }

    #[test]
    fn observation_defuses_drop() {
        let promise: Promise<i32> = Promise::new();
        let sync = promise.future().sync();
        assert!(sync.is_running());
        // Still pending, but observed: drop must not block.
    }

    #[test]
    fn clone_transfers_blocking_responsibility() {
        let promise: Promise<i32> = Promise::new();
        let source = promise.future().sync();
        let copy = source.clone();
        promise.set_value(3);
        drop(source); // consumed by the clone; returns immediately
        assert_eq!(copy.value(Timeout::None), Ok(3));
    }

    #[test]
    fn detach_returns_the_inner_future() {
        let promise: Promise<i32> = Promise::new();
        let sync = promise.future().sync();
        let detached = sync.detach();
        promise.set_value(9);
        assert_eq!(detached.value(Timeout::None), Ok(9));
    }
}
