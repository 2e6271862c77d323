/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, ThreadId};

use crate::builtin::Variant;
use crate::meta::Signature;
use crate::obj::{Object, WeakObject};
use crate::task::EventLoop;

/// Identifier of one subscription, unique within its signal. Never zero.
pub type SubscriberId = u32;

/// How a subscriber's callable is invoked when the signal triggers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// Synchronously on the triggering thread, in registration order.
    #[default]
    Direct,
    /// Posted to the subscriber's event loop.
    Queued,
}

/// A subscriber: callable, dispatch mode, optional target loop, optional liveness gate.
///
/// The callable is owned by the signal until disconnected. A subscriber whose callable
/// captures an [`Object`] should instead be [`bound_to`][Self::bound_to] that object and
/// capture a [`WeakObject`]: the gate breaks the *object → signal → subscriber → object*
/// reference cycle, and triggering skips (and prunes) subscribers whose gate no longer
/// upgrades.
pub struct SignalSubscriber {
    callable: Arc<dyn Fn(&[Variant]) + Send + Sync>,
    mode: DispatchMode,
    target: Option<EventLoop>,
    liveness: Option<WeakObject>,
}

impl SignalSubscriber {
    /// A directly-dispatched subscriber.
    pub fn new(callable: impl Fn(&[Variant]) + Send + Sync + 'static) -> Self {
        SignalSubscriber {
            callable: Arc::new(callable),
            mode: DispatchMode::Direct,
            target: None,
            liveness: None,
        }
    }

    /// Switches the subscriber to queued dispatch on `target`.
    pub fn queued_on(mut self, target: &EventLoop) -> Self {
        self.mode = DispatchMode::Queued;
        self.target = Some(target.clone());
        self
    }

    /// Gates the subscriber on `object` staying alive, without keeping it alive.
    pub fn bound_to(mut self, object: &Object) -> Self {
        self.liveness = Some(object.downgrade());
        self
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }
}

struct SubscriberEntry {
    id: SubscriberId,
    subscriber: SignalSubscriber,
    enabled: AtomicBool,
    // Held while the callable runs; disconnect blocks on it so that a subscriber is never
    // invoked after disconnect() returned.
    busy: Mutex<()>,
    busy_thread: Mutex<Option<ThreadId>>,
}

impl SubscriberEntry {
    /// Invokes the callable under the busy guard, honoring the enabled flag and liveness gate.
    fn invoke(&self, args: &[Variant]) {
        if !self.enabled.load(Ordering::SeqCst) {
            return;
        }
        if let Some(gate) = &self.subscriber.liveness {
            if gate.upgrade().is_none() {
                self.enabled.store(false, Ordering::SeqCst);
                return;
            }
        }

        let current = thread::current().id();
        if *self.busy_thread.lock().unwrap() == Some(current) {
            // Re-entrant trigger from inside the callable; the outer invocation holds the
            // busy guard already.
            (self.subscriber.callable)(args);
            return;
        }

        let guard = self.busy.lock().unwrap();
        *self.busy_thread.lock().unwrap() = Some(current);
        if self.enabled.load(Ordering::SeqCst) {
            (self.subscriber.callable)(args);
        }
        *self.busy_thread.lock().unwrap() = None;
        drop(guard);
    }
}

struct SignalInner {
    next_id: SubscriberId,
    entries: Vec<Arc<SubscriberEntry>>,
}

/// Multicast event with a fixed parameter signature and a dynamic subscriber set.
///
/// The subscriber table is read-mostly: [`trigger()`][Self::trigger] snapshots it under a read
/// lock and dispatches unlocked, so subscribers may freely connect, disconnect and re-trigger
/// from inside their callables.
pub struct SignalBase {
    signature: Signature,
    inner: RwLock<SignalInner>,
}

impl SignalBase {
    pub fn new(signature: Signature) -> Self {
        SignalBase {
            signature,
            inner: RwLock::new(SignalInner {
                next_id: 1,
                entries: Vec::new(),
            }),
        }
    }

    /// The parameter signature subscribers are invoked with.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.read().unwrap().entries.len()
    }

    /// Appends a subscriber and returns its id.
    pub fn connect(&self, subscriber: SignalSubscriber) -> SubscriberId {
        let mut inner = self.inner.write().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push(Arc::new(SubscriberEntry {
            id,
            subscriber,
            enabled: AtomicBool::new(true),
            busy: Mutex::new(()),
            busy_thread: Mutex::new(None),
        }));
        id
    }

    /// Removes a subscriber. Returns whether the id was registered.
    ///
    /// On return, the subscriber's callable is guaranteed not to be running and never to run
    /// again -- unless `disconnect` was called from inside that very callable, in which case
    /// only the "never again" half holds.
    pub fn disconnect(&self, id: SubscriberId) -> bool {
        let entry = {
            let mut inner = self.inner.write().unwrap();
            let Some(index) = inner.entries.iter().position(|e| e.id == id) else {
                return false;
            };
            let entry = inner.entries.remove(index);
            entry.enabled.store(false, Ordering::SeqCst);
            entry
        };

        let current = thread::current().id();
        if *entry.busy_thread.lock().unwrap() != Some(current) {
            // Wait out an in-flight invocation on another thread.
            drop(entry.busy.lock().unwrap());
        }
        true
    }

    /// Delivers `args` to the subscribers registered at entry.
    ///
    /// Direct subscribers run on the calling thread in registration order; queued subscribers
    /// are posted to their loop (per-loop FIFO preserves registration order within one loop).
    /// Subscribers connecting during delivery are not invoked by this call.
    pub fn trigger(&self, args: &[Variant]) {
        let snapshot: Vec<Arc<SubscriberEntry>> = self.inner.read().unwrap().entries.clone();

        for entry in &snapshot {
            match entry.subscriber.mode {
                DispatchMode::Direct => entry.invoke(args),
                DispatchMode::Queued => match entry.subscriber.target.clone() {
                    Some(target) => {
                        let entry = entry.clone();
                        let args = args.to_vec();
                        target.post(move || entry.invoke(&args));
                    }
                    None => entry.invoke(args),
                },
            }
        }

        // Entries disabled by a failed liveness upgrade stay in the table until pruned here.
        if snapshot.iter().any(|e| !e.enabled.load(Ordering::SeqCst)) {
            let mut inner = self.inner.write().unwrap();
            let before = inner.entries.len();
            inner.entries.retain(|e| e.enabled.load(Ordering::SeqCst));
            let pruned = before - inner.entries.len();
            if pruned > 0 {
                tracing::debug!(pruned, "removed subscribers with dead objects");
            }
        }
    }
}

impl fmt::Debug for SignalBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalBase")
            .field("signature", &self.signature)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
