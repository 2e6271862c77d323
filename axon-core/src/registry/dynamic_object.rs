/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::builtin::Variant;
use crate::meta::{CallError, MetaObject};
use crate::obj::{CallType, LinkId, Object, ObjectBackend};
use crate::registry::signal::{SignalBase, SignalSubscriber};
use crate::registry::dispatch_call;
use crate::task::{EventLoop, Future};

/// A method installed into a [`DynamicObject`].
pub type DynamicMethod = Arc<dyn Fn(&[Variant]) -> Result<Variant, CallError> + Send + Sync>;

/// Object backend whose method table is populated at runtime.
///
/// Built from a [`MetaObject`] description; methods are installed per id with
/// [`set_method()`][Self::set_method] and may be replaced while the object is shared (the
/// table is copy-on-write, concurrent calls keep using the table they started with). One
/// [`SignalBase`] is materialized lazily per described signal.
///
/// This is the backend remote proxies and scripting bridges are made of: anything that learns
/// an object description at runtime and supplies callables for it.
pub struct DynamicObject {
    meta: MetaObject,
    methods: RwLock<Arc<HashMap<u32, DynamicMethod>>>,
    signals: Mutex<HashMap<u32, Arc<SignalBase>>>,
    event_loop: Option<EventLoop>,
}

impl DynamicObject {
    pub fn new(meta: MetaObject) -> Self {
        DynamicObject {
            meta,
            methods: RwLock::new(Arc::new(HashMap::new())),
            signals: Mutex::new(HashMap::new()),
            event_loop: None,
        }
    }

    /// Associates the object with an event loop; `Queued` and foreign-thread `Auto` calls are
    /// marshalled onto it.
    pub fn with_event_loop(mut self, event_loop: EventLoop) -> Self {
        self.event_loop = Some(event_loop);
        self
    }

    /// Installs (or replaces) the callable behind a method id.
    pub fn set_method<F>(&self, id: u32, callable: F)
    where
        F: Fn(&[Variant]) -> Result<Variant, CallError> + Send + Sync + 'static,
    {
        let mut methods = self.methods.write().unwrap();
        let mut table: HashMap<u32, DynamicMethod> = (**methods).clone();
        table.insert(id, Arc::new(callable));
        *methods = Arc::new(table);
    }

    pub fn method(&self, id: u32) -> Option<DynamicMethod> {
        self.methods.read().unwrap().get(&id).cloned()
    }

    /// The signal behind `id`, created on first use from the meta-object's description.
    pub fn signal_base(&self, id: u32) -> Option<Arc<SignalBase>> {
        let description = self.meta.signal(id)?;
        let mut signals = self.signals.lock().unwrap();
        let signal = signals
            .entry(id)
            .or_insert_with(|| Arc::new(SignalBase::new(description.parameters().clone())));
        Some(signal.clone())
    }

    /// Wraps the backend into a shared [`Object`] handle.
    pub fn into_object(self) -> Object {
        Object::new(self)
    }
}

impl ObjectBackend for DynamicObject {
    fn meta_object(&self) -> &MetaObject {
        &self.meta
    }

    fn meta_call(&self, method: u32, args: &[Variant], call_type: CallType) -> Future<Variant> {
        let Some(callable) = self.method(method) else {
            return Future::from_error(CallError::NoSuchMethod.to_string());
        };
        let args = args.to_vec();
        dispatch_call(self.event_loop.as_ref(), call_type, move || {
            callable(&args)
        })
    }

    fn meta_emit(&self, signal: u32, args: &[Variant]) {
        match self.signal_base(signal) {
            Some(base) => base.trigger(args),
            None => tracing::error!(signal, "emit on unknown signal"),
        }
    }

    fn connect(&self, signal: u32, subscriber: SignalSubscriber) -> Future<LinkId> {
        let Some(base) = self.signal_base(signal) else {
            return Future::from_error(CallError::NoSuchSignal(signal).to_string());
        };
        let local = base.connect(subscriber);
        match LinkId::new(signal, local) {
            Some(link) => Future::from_value(link),
            None => {
                base.disconnect(local);
                Future::from_error("Signal link id too big")
            }
        }
    }

    fn disconnect(&self, link: LinkId) -> Future<()> {
        let Some(base) = self.signal_base(link.signal_id()) else {
            return Future::from_error(CallError::NoSuchSignal(link.signal_id()).to_string());
        };
        if base.disconnect(link.subscriber_id()) {
            Future::from_value(())
        } else {
            Future::from_error(CallError::NoSuchLink.to_string())
        }
    }

    fn event_loop(&self) -> Option<EventLoop> {
        self.event_loop.clone()
    }
}
