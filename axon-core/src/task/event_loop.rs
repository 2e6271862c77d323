/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crate::task::{Future, Promise};

/// Error text of tasks resolved because their loop was stopped before they ran.
pub(crate) const ERR_LOOP_STOPPED: &str = "Event loop stopped";

/// Error text of tasks canceled before they started.
pub(crate) const ERR_TASK_CANCELED: &str = "async task canceled";

/// A named, single-threaded cooperative dispatcher.
///
/// Work posted with [`post()`][Self::post] or [`post_delayed()`][Self::post_delayed] runs on the
/// loop's worker thread, in FIFO order for equal deadlines. Handles are cheap clones sharing
/// the same worker.
///
/// The returned task future is canceleable: [`Future::cancel()`] before the callable has
/// started guarantees it never runs; the future then resolves with an error once its deadline
/// passes. A task already running is not interrupted.
#[derive(Clone)]
pub struct EventLoop {
    shared: Arc<LoopShared>,
}

struct LoopShared {
    name: String,
    state: Mutex<QueueState>,
    wake: Condvar,
    worker: Mutex<Option<JoinHandle<()>>>,
    thread_id: OnceLock<ThreadId>,
}

struct QueueState {
    queue: BinaryHeap<ScheduledTask>,
    next_seq: u64,
    running: bool,
}

struct ScheduledTask {
    deadline: Instant,
    // Tie-breaker keeping FIFO order for equal deadlines.
    seq: u64,
    job: Box<dyn FnOnce() + Send>,
    promise: Promise<()>,
    canceled: Arc<AtomicBool>,
}

// Ordering is reversed so that the std max-heap pops the earliest deadline (lowest seq first).
impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for ScheduledTask {}

impl EventLoop {
    /// Spawns a new loop with a named worker thread.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let shared = Arc::new(LoopShared {
            name: name.clone(),
            state: Mutex::new(QueueState {
                queue: BinaryHeap::new(),
                next_seq: 0,
                running: true,
            }),
            wake: Condvar::new(),
            worker: Mutex::new(None),
            thread_id: OnceLock::new(),
        });

        let worker_shared = shared.clone();
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || {
                let _ = worker_shared.thread_id.set(thread::current().id());
                run_loop(&worker_shared);
            })
            .expect("failed to spawn event loop thread");
        *shared.worker.lock().unwrap() = Some(handle);

        EventLoop { shared }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Whether the calling thread is this loop's worker thread.
    pub fn is_in_loop_thread(&self) -> bool {
        self.shared
            .thread_id
            .get()
            .is_some_and(|id| *id == thread::current().id())
    }

    /// Posts a callable for immediate execution.
    pub fn post<F>(&self, job: F) -> Future<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.post_delayed(Duration::ZERO, job)
    }

    /// Posts a callable to run once `delay` has elapsed.
    ///
    /// The returned future completes when the callable completes. Canceling it before the
    /// callable has started prevents invocation; the future resolves with an error when the
    /// deadline passes.
    pub fn post_delayed<F>(&self, delay: Duration, job: F) -> Future<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let canceled = Arc::new(AtomicBool::new(false));
        let cancel_flag = canceled.clone();
        let promise = Promise::with_cancel_callback(move |_p: Promise<()>| {
            // Cooperative: flag only; the worker resolves the future at the deadline.
            cancel_flag.store(true, AtomicOrdering::SeqCst);
        });
        let future = promise.future();

        let mut state = self.shared.state.lock().unwrap();
        if !state.running {
            drop(state);
            promise.set_error(ERR_LOOP_STOPPED);
            return future;
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push(ScheduledTask {
            deadline: Instant::now() + delay,
            seq,
            job: Box::new(job),
            promise,
            canceled,
        });
        self.shared.wake.notify_all();
        drop(state);

        future
    }

    /// Stops the worker and joins it (unless called from the loop thread itself).
    ///
    /// Tasks still queued resolve with the error `"Event loop stopped"`.
    pub fn stop(&self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            if !state.running {
                return;
            }
            state.running = false;
            self.shared.wake.notify_all();
        }

        let handle = self.shared.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            if !self.is_in_loop_thread() {
                let _ = handle.join();
            }
        }
    }
}

fn run_loop(shared: &LoopShared) {
    loop {
        let mut state = shared.state.lock().unwrap();
        let task = loop {
            if !state.running {
                break None;
            }
            let next_deadline = state.queue.peek().map(|t| t.deadline);
            match next_deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if deadline <= now {
                        break state.queue.pop();
                    }
                    let (guard, _) = shared
                        .wake
                        .wait_timeout(state, deadline - now)
                        .unwrap();
                    state = guard;
                }
                None => {
                    state = shared.wake.wait(state).unwrap();
                }
            }
        };

        match task {
            Some(task) => {
                drop(state);
                execute(task);
            }
            None => {
                let leftovers: Vec<ScheduledTask> = state.queue.drain().collect();
                drop(state);
                if !leftovers.is_empty() {
                    tracing::warn!(
                        loop_name = %shared.name,
                        pending = leftovers.len(),
                        "event loop stopped with pending tasks"
                    );
                }
                for task in leftovers {
                    task.promise.set_error(ERR_LOOP_STOPPED);
                }
                return;
            }
        }
    }
}

fn execute(task: ScheduledTask) {
    if task.canceled.load(AtomicOrdering::SeqCst) {
        task.promise.set_error(ERR_TASK_CANCELED);
        return;
    }
    match panic::catch_unwind(AssertUnwindSafe(task.job)) {
        Ok(()) => task.promise.set_value(()),
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "task panicked".to_string());
            tracing::error!(msg = %msg, "event loop task panicked");
            task.promise.set_error(msg);
        }
    }
}
