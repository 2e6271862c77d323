/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::meta::ParamTuple;
use crate::registry::signal::{SignalBase, SignalSubscriber, SubscriberId};

/// Type-safe wrapper over a [`SignalBase`].
///
/// The generic argument `Ps` is the parameter tuple of the signal; it fixes the signal's
/// signature and gives [`emit()`][Self::emit] and [`connect()`][Self::connect] typed surfaces.
/// Statically-described objects declare their signals as `TypedSignal` fields and register a
/// getter per field.
///
/// ```
/// use axon_core::registry::signal::TypedSignal;
///
/// let on_temperature: TypedSignal<(f64, String)> = TypedSignal::new();
/// on_temperature.connect(|(celsius, sensor)| {
///     println!("{sensor}: {celsius}");
/// });
/// on_temperature.emit((21.5, "head".to_string()));
/// ```
pub struct TypedSignal<Ps: ParamTuple> {
    base: Arc<SignalBase>,
    _params: PhantomData<fn(Ps)>,
}

impl<Ps: ParamTuple> TypedSignal<Ps> {
    pub fn new() -> Self {
        TypedSignal {
            base: Arc::new(SignalBase::new(Ps::signature())),
            _params: PhantomData,
        }
    }

    /// Triggers the signal with a typed argument tuple.
    pub fn emit(&self, args: Ps) {
        self.base.trigger(&args.to_variants());
    }

    /// Connects a typed receiver, dispatched directly.
    pub fn connect<F>(&self, receiver: F) -> SubscriberId
    where
        F: Fn(Ps) + Send + Sync + 'static,
    {
        self.base
            .connect(SignalSubscriber::new(move |args| {
                match Ps::from_variants(args) {
                    Ok(params) => receiver(params),
                    Err(error) => {
                        tracing::warn!(%error, "signal arguments do not match the receiver")
                    }
                }
            }))
    }

    /// Connects a fully-configured subscriber (queued dispatch, liveness gate, ...).
    pub fn connect_subscriber(&self, subscriber: SignalSubscriber) -> SubscriberId {
        self.base.connect(subscriber)
    }

    pub fn disconnect(&self, id: SubscriberId) -> bool {
        self.base.disconnect(id)
    }

    /// The untyped signal backing this wrapper; what signal getters of statically-described
    /// objects return.
    pub fn base(&self) -> &SignalBase {
        &self.base
    }
}

impl<Ps: ParamTuple> Default for TypedSignal<Ps> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ps: ParamTuple> fmt::Debug for TypedSignal<Ps> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedSignal")
            .field("signature", self.base.signature())
            .field("subscribers", &self.base.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn typed_emit_reaches_typed_receivers() {
        let signal: TypedSignal<(i32, String)> = TypedSignal::new();
        assert_eq!(signal.base().signature().as_str(), "(is)");

        let received = Arc::new(Mutex::new(None));
        let probe = received.clone();
        signal.connect(move |(count, label)| {
            *probe.lock().unwrap() = Some((count, label));
        });

        signal.emit((3, "three".to_string()));
        assert_eq!(
            received.lock().unwrap().take(),
            Some((3, "three".to_string()))
        );
    }

    #[test]
    fn disconnect_through_the_wrapper() {
        let signal: TypedSignal<()> = TypedSignal::new();
        let id = signal.connect(|_| {});
        assert!(signal.disconnect(id));
        assert!(!signal.disconnect(id));
    }
}
