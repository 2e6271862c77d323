/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;
use std::sync::{Arc, Weak};

use crate::builtin::Variant;
use crate::meta::MetaObject;
use crate::obj::LinkId;
use crate::registry::signal::SignalSubscriber;
use crate::task::{EventLoop, Future};

/// How a meta call is marshalled onto the object's event loop.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum CallType {
    /// Pick `Direct` when the caller already runs on the object's loop (or the object has no
    /// loop), `Queued` otherwise. This is what prevents an object calling itself from
    /// deadlocking on its own loop.
    #[default]
    Auto,
    /// Execute on the calling thread; the returned future is already terminal.
    Direct,
    /// Post to the object's event loop; the returned future is pending.
    Queued,
}

/// Uniform surface of an object, implemented by both the dynamic and the statically-described
/// backend.
///
/// All failures of the asynchronous operations are reported through the returned future's
/// error channel; see [`CallError`][crate::meta::CallError] for the stable message texts.
pub trait ObjectBackend: Send + Sync + 'static {
    fn meta_object(&self) -> &MetaObject;

    /// Invokes the method with the given id.
    fn meta_call(&self, method: u32, args: &[Variant], call_type: CallType) -> Future<Variant>;

    /// Triggers the signal with the given id. Unknown ids are logged and dropped: emission has
    /// no return channel.
    fn meta_emit(&self, signal: u32, args: &[Variant]);

    /// Subscribes to the signal with the given id.
    fn connect(&self, signal: u32, subscriber: SignalSubscriber) -> Future<LinkId>;

    /// Removes the subscription identified by `link`.
    fn disconnect(&self, link: LinkId) -> Future<()>;

    /// The loop this object dispatches on, if any (the "manageable" capability).
    fn event_loop(&self) -> Option<EventLoop> {
        None
    }
}

/// Shared handle to an object.
///
/// Identity is the backend allocation: clones compare equal, distinct objects never do. The
/// object is dropped when the last strong handle (including those inside [`Variant`]s) goes
/// away; subscribers that must not keep it alive hold a [`WeakObject`] instead.
#[derive(Clone)]
pub struct Object {
    backend: Arc<dyn ObjectBackend>,
}

impl Object {
    pub fn new(backend: impl ObjectBackend) -> Self {
        Object {
            backend: Arc::new(backend),
        }
    }

    pub fn meta_object(&self) -> &MetaObject {
        self.backend.meta_object()
    }

    pub fn meta_call(&self, method: u32, args: &[Variant], call_type: CallType) -> Future<Variant> {
        self.backend.meta_call(method, args, call_type)
    }

    pub fn meta_emit(&self, signal: u32, args: &[Variant]) {
        self.backend.meta_emit(signal, args)
    }

    pub fn connect(&self, signal: u32, subscriber: SignalSubscriber) -> Future<LinkId> {
        self.backend.connect(signal, subscriber)
    }

    pub fn disconnect(&self, link: LinkId) -> Future<()> {
        self.backend.disconnect(link)
    }

    pub fn event_loop(&self) -> Option<EventLoop> {
        self.backend.event_loop()
    }

    /// Resolves `name` against the meta-object (best-scoring overload for the actual argument
    /// types) and invokes it with [`CallType::Auto`].
    pub fn call(&self, name: &str, args: &[Variant]) -> Future<Variant> {
        let meta = self.backend.meta_object();
        match meta.find_method(name, &Variant::args_signature(args)) {
            Ok(method) => self.backend.meta_call(method.id(), args, CallType::Auto),
            Err(error) => Future::from_error(error.to_string()),
        }
    }

    pub fn downgrade(&self) -> WeakObject {
        WeakObject {
            backend: Arc::downgrade(&self.backend),
        }
    }

    pub(crate) fn ptr_id(&self) -> usize {
        Arc::as_ptr(&self.backend) as *const () as usize
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.backend, &other.backend)
    }
}

impl Eq for Object {}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meta = self.backend.meta_object();
        f.debug_struct("Object")
            .field("id", &self.ptr_id())
            .field("methods", &meta.methods().count())
            .field("signals", &meta.signals().count())
            .finish()
    }
}

/// Non-owning handle to an [`Object`].
///
/// Used to break reference cycles of the shape *object → signal → subscriber → object*: the
/// subscriber holds a weak handle, and triggering skips subscribers whose handle no longer
/// upgrades.
#[derive(Clone)]
pub struct WeakObject {
    backend: Weak<dyn ObjectBackend>,
}

impl WeakObject {
    pub fn upgrade(&self) -> Option<Object> {
        self.backend.upgrade().map(|backend| Object { backend })
    }
}

impl fmt::Debug for WeakObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObject")
            .field("alive", &(self.backend.strong_count() > 0))
            .finish()
    }
}
