/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Asynchronous primitives: event loops, futures/promises and their combinators.
//!
//! The runtime does not prescribe a thread model to applications. User code runs on arbitrary
//! threads; [`EventLoop`]s are single-threaded cooperative dispatchers that own all work posted
//! to them. Results travel through [`Future`]/[`Promise`] pairs, which are plain shared-state
//! cells with continuations rather than poll-based `std` futures.

mod barrier;
mod event_loop;
mod future;
mod future_sync;
mod runtime;

pub use barrier::{wait_for_all, wait_for_first, FutureBarrier};
pub use event_loop::EventLoop;
pub use future::{Future, FutureError, FutureState, Promise, Timeout};
pub use future_sync::FutureSync;
pub use runtime::{Runtime, RuntimeBuilder};
