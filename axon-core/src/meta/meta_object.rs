/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::collections::BTreeMap;

use crate::meta::error::CallError;
use crate::meta::Signature;

/// First id available to user-registered methods and signals.
///
/// Ids below this are reserved for platform-provided members (introspection, statistics, ...)
/// which every object of the platform shares.
pub const FIRST_USER_ID: u32 = 10;

/// Description of one callable method.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetaMethod {
    id: u32,
    name: String,
    return_signature: Signature,
    parameter_signature: Signature,
}

impl MetaMethod {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn return_signature(&self) -> &Signature {
        &self.return_signature
    }

    /// The parameter list as a single tuple signature, e.g. `(is)`.
    pub fn parameters(&self) -> &Signature {
        &self.parameter_signature
    }

    /// Full textual form `ret name::(params)`; the return part is omitted when empty.
    pub fn full_signature(&self) -> String {
        if self.return_signature.is_empty() {
            format!("{}::{}", self.name, self.parameter_signature)
        } else {
            format!(
                "{} {}::{}",
                self.return_signature, self.name, self.parameter_signature
            )
        }
    }
}

/// Description of one signal.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetaSignal {
    id: u32,
    name: String,
    parameter_signature: Signature,
}

impl MetaSignal {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &Signature {
        &self.parameter_signature
    }
}

/// Frozen, self-describing schema of an object: its methods and signals by id.
///
/// Built once through [`MetaObjectBuilder`] and immutable afterwards; lookups never require a
/// lock. Ids are stable per object type and are what travels on the wire.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetaObject {
    methods: BTreeMap<u32, MetaMethod>,
    signals: BTreeMap<u32, MetaSignal>,
}

impl MetaObject {
    pub fn builder() -> MetaObjectBuilder {
        MetaObjectBuilder::new()
    }

    pub fn method(&self, id: u32) -> Option<&MetaMethod> {
        self.methods.get(&id)
    }

    pub fn signal(&self, id: u32) -> Option<&MetaSignal> {
        self.signals.get(&id)
    }

    /// All methods in ascending id order.
    pub fn methods(&self) -> impl Iterator<Item = &MetaMethod> {
        self.methods.values()
    }

    /// All signals in ascending id order.
    pub fn signals(&self) -> impl Iterator<Item = &MetaSignal> {
        self.signals.values()
    }

    /// Resolves an overload by name and argument signature.
    ///
    /// Candidates share the name; the one with the highest
    /// [convertibility][Signature::is_convertible_to] score from `args` wins. Ties resolve to
    /// the lower id (iteration is in ascending id order, and only a strictly better score
    /// displaces the current best). No candidate scoring above zero fails with
    /// [`CallError::NoSuchMethod`].
    pub fn find_method(&self, name: &str, args: &Signature) -> Result<&MetaMethod, CallError> {
        let mut best: Option<(&MetaMethod, f32)> = None;
        for method in self.methods.values().filter(|m| m.name == name) {
            let score = args.is_convertible_to(&method.parameter_signature);
            if score > 0.0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((method, score));
            }
        }
        best.map(|(m, _)| m).ok_or(CallError::NoSuchMethod)
    }
}

/// Accumulates `(id, name, signature)` records and freezes them into a [`MetaObject`].
#[derive(Clone, Debug, Default)]
pub struct MetaObjectBuilder {
    methods: BTreeMap<u32, MetaMethod>,
    signals: BTreeMap<u32, MetaSignal>,
    next_id: u32,
}

impl MetaObjectBuilder {
    pub fn new() -> Self {
        MetaObjectBuilder {
            methods: BTreeMap::new(),
            signals: BTreeMap::new(),
            next_id: FIRST_USER_ID,
        }
    }

    /// Registers a method under the next free user id and returns that id.
    pub fn add_method(
        &mut self,
        name: impl Into<String>,
        return_signature: Signature,
        parameters: Signature,
    ) -> u32 {
        let id = self.allocate_id();
        self.add_method_with_id(id, name, return_signature, parameters);
        id
    }

    /// Registers a method under an explicit id.
    ///
    /// Explicit ids serve two callers: the platform registering its reserved members below
    /// [`FIRST_USER_ID`], and transports replaying a description received from a remote node.
    ///
    /// # Panics
    /// If `id` is already taken by a method.
    pub fn add_method_with_id(
        &mut self,
        id: u32,
        name: impl Into<String>,
        return_signature: Signature,
        parameters: Signature,
    ) -> &mut Self {
        let method = MetaMethod {
            id,
            name: name.into(),
            return_signature,
            parameter_signature: parameters,
        };
        let previous = self.methods.insert(id, method);
        assert!(previous.is_none(), "method id {id} registered twice");
        self.next_id = self.next_id.max(id + 1);
        self
    }

    /// Registers a signal under the next free user id and returns that id.
    pub fn add_signal(&mut self, name: impl Into<String>, parameters: Signature) -> u32 {
        let id = self.allocate_id();
        self.add_signal_with_id(id, name, parameters);
        id
    }

    /// Registers a signal under an explicit id. See [`add_method_with_id`][Self::add_method_with_id].
    ///
    /// # Panics
    /// If `id` is already taken by a signal.
    pub fn add_signal_with_id(
        &mut self,
        id: u32,
        name: impl Into<String>,
        parameters: Signature,
    ) -> &mut Self {
        let signal = MetaSignal {
            id,
            name: name.into(),
            parameter_signature: parameters,
        };
        let previous = self.signals.insert(id, signal);
        assert!(previous.is_none(), "signal id {id} registered twice");
        self.next_id = self.next_id.max(id + 1);
        self
    }

    pub fn build(self) -> MetaObject {
        MetaObject {
            methods: self.methods,
            signals: self.signals,
        }
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(text: &str) -> Signature {
        Signature::new(text).unwrap()
    }

    #[test]
    fn builder_allocates_ids_from_the_user_range() {
        let mut builder = MetaObject::builder();
        let m0 = builder.add_method("ping", sig("s"), sig("()"));
        let s0 = builder.add_signal("pong", sig("(s)"));
        assert_eq!(m0, FIRST_USER_ID);
        assert_eq!(s0, FIRST_USER_ID + 1);

        let meta = builder.build();
        assert_eq!(meta.method(m0).unwrap().name(), "ping");
        assert_eq!(meta.signal(s0).unwrap().name(), "pong");
        assert!(meta.method(0).is_none());
    }

    #[test]
    fn explicit_ids_may_use_the_reserved_range() {
        let mut builder = MetaObject::builder();
        builder.add_method_with_id(2, "describe", sig("m"), sig("()"));
        let user = builder.add_method("work", sig("v"), sig("(i)"));
        assert_eq!(user, FIRST_USER_ID);
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn duplicate_method_id_panics() {
        let mut builder = MetaObject::builder();
        builder.add_method_with_id(12, "a", sig("v"), sig("()"));
        builder.add_method_with_id(12, "b", sig("v"), sig("()"));
    }

    #[test]
    fn find_method_picks_the_best_scoring_overload() {
        let mut builder = MetaObject::builder();
        let exact = builder.add_method("add", sig("i"), sig("(ii)"));
        let wide = builder.add_method("add", sig("l"), sig("(ll)"));
        let meta = builder.build();

        let found = meta.find_method("add", &sig("(ii)")).unwrap();
        assert_eq!(found.id(), exact);

        let found = meta.find_method("add", &sig("(ll)")).unwrap();
        assert_eq!(found.id(), wide);
    }

    #[test]
    fn find_method_breaks_ties_on_the_lower_id() {
        let mut builder = MetaObject::builder();
        let first = builder.add_method("go", sig("v"), sig("(i)"));
        let _second = builder.add_method("go", sig("v"), sig("(i)"));
        let meta = builder.build();

        assert_eq!(meta.find_method("go", &sig("(i)")).unwrap().id(), first);
    }

    #[test]
    fn find_method_rejects_unconvertible_arguments() {
        let mut builder = MetaObject::builder();
        builder.add_method("greet", sig("v"), sig("(s)"));
        let meta = builder.build();

        let err = meta.find_method("greet", &sig("(i)")).unwrap_err();
        assert_eq!(err, CallError::NoSuchMethod);
        assert_eq!(err.to_string(), "No such method");

        let err = meta.find_method("absent", &sig("()")).unwrap_err();
        assert_eq!(err, CallError::NoSuchMethod);
    }

    #[test]
    fn full_signature_renders_both_forms() {
        let mut builder = MetaObject::builder();
        builder.add_method("add", sig("i"), sig("(ii)"));
        builder.add_method("notify", Signature::empty(), sig("(s)"));
        let meta = builder.build();

        let rendered: Vec<String> = meta.methods().map(|m| m.full_signature()).collect();
        assert_eq!(rendered, vec!["i add::(ii)", "notify::(s)"]);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn description_round_trips_through_json() {
        let mut builder = MetaObject::builder();
        builder.add_method("add", sig("i"), sig("(ii)"));
        builder.add_signal("added", sig("(i)"));
        let meta = builder.build();

        let json = serde_json::to_string(&meta).unwrap();
        let back: MetaObject = serde_json::from_str(&json).unwrap();
        assert_eq!(meta, back);
    }
}
