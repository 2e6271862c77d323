/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::any::{self, Any, TypeId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::builtin::{ToVariant, TypedVariant, Variant};
use crate::meta::{CallError, MetaObject, MetaObjectBuilder, ParamTuple, Signature};
use crate::obj::{CallType, LinkId, Object, ObjectBackend};
use crate::registry::dispatch_call;
use crate::registry::signal::{SignalBase, SignalSubscriber, TypedSignal};
use crate::task::{EventLoop, Future};

type ErasedInstance = dyn Any + Send + Sync;
type ErasedMethod =
    Arc<dyn Fn(&ErasedInstance, &[Variant]) -> Result<Variant, CallError> + Send + Sync>;
type ErasedSignalGetter =
    Arc<dyn for<'a> Fn(&'a ErasedInstance) -> Option<&'a SignalBase> + Send + Sync>;

/// Frozen description of a statically-described object type.
///
/// Registered once per Rust type through [`ObjectTypeBuilder`] and shared by every instance:
/// the method map, the signal getter map and the parent list are immutable after
/// [`build()`][ObjectTypeBuilder::build], so calls read them without locks.
pub struct ObjectType {
    type_id: TypeId,
    type_name: &'static str,
    meta: MetaObject,
    methods: HashMap<u32, ErasedMethod>,
    signal_getters: HashMap<u32, ErasedSignalGetter>,
    parents: Vec<(Arc<ObjectType>, isize)>,
}

impl ObjectType {
    pub fn meta_object(&self) -> &MetaObject {
        &self.meta
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Direct parent types with their pointer adjustment offsets.
    pub fn parents(&self) -> &[(Arc<ObjectType>, isize)] {
        &self.parents
    }

    /// Walks the parent DAG breadth-first; returns the accumulated offset to `other`, or
    /// `None` when this type does not inherit it. A type inherits itself at offset 0.
    pub fn inherits(&self, other: &ObjectType) -> Option<isize> {
        if self.type_id == other.type_id {
            return Some(0);
        }
        let mut visited: HashSet<TypeId> = HashSet::new();
        let mut queue: VecDeque<(Arc<ObjectType>, isize)> = self
            .parents
            .iter()
            .map(|(parent, offset)| (parent.clone(), *offset))
            .collect();

        while let Some((candidate, offset)) = queue.pop_front() {
            if candidate.type_id == other.type_id {
                return Some(offset);
            }
            if !visited.insert(candidate.type_id) {
                continue;
            }
            for (parent, parent_offset) in &candidate.parents {
                queue.push_back((parent.clone(), offset + parent_offset));
            }
        }
        None
    }
}

impl fmt::Debug for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectType")
            .field("type_name", &self.type_name)
            .field("methods", &self.methods.len())
            .field("signals", &self.signal_getters.len())
            .field("parents", &self.parents.len())
            .finish()
    }
}

/// Builds the [`ObjectType`] of a Rust type `T`: its meta-object together with the callables
/// and signal getters backing it.
///
/// ```
/// use axon_core::registry::signal::TypedSignal;
/// use axon_core::registry::{ObjectTypeBuilder, StaticObject};
/// use std::sync::Arc;
///
/// struct Thermometer {
///     celsius: f64,
///     on_read: TypedSignal<(f64,)>,
/// }
///
/// let mut builder = ObjectTypeBuilder::<Thermometer>::new();
/// builder.method("read", |t: &Thermometer, _: ()| t.celsius);
/// builder.signal("read_done", |t: &Thermometer| &t.on_read);
/// let ty = builder.build();
///
/// let instance = Arc::new(Thermometer { celsius: 21.0, on_read: TypedSignal::new() });
/// let object = StaticObject::new(ty, instance).into_object();
/// ```
pub struct ObjectTypeBuilder<T> {
    meta: MetaObjectBuilder,
    methods: HashMap<u32, ErasedMethod>,
    signal_getters: HashMap<u32, ErasedSignalGetter>,
    parents: Vec<(Arc<ObjectType>, isize)>,
    _instance: PhantomData<fn(T)>,
}

impl<T: Send + Sync + 'static> Default for ObjectTypeBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> ObjectTypeBuilder<T> {
    pub fn new() -> Self {
        ObjectTypeBuilder {
            meta: MetaObjectBuilder::new(),
            methods: HashMap::new(),
            signal_getters: HashMap::new(),
            parents: Vec::new(),
            _instance: PhantomData,
        }
    }

    /// Registers a typed method; signatures derive from the parameter tuple and return type.
    pub fn method<Ps, R, F>(&mut self, name: impl Into<String>, callable: F) -> u32
    where
        Ps: ParamTuple,
        R: TypedVariant,
        F: Fn(&T, Ps) -> R + Send + Sync + 'static,
    {
        self.method_raw(
            name,
            R::static_signature(),
            Ps::signature(),
            move |instance, args| {
                let params = Ps::from_variants(args)?;
                Ok(callable(instance, params).to_variant())
            },
        )
    }

    /// Registers a method from explicit signatures and an untyped callable.
    pub fn method_raw<F>(
        &mut self,
        name: impl Into<String>,
        return_signature: Signature,
        parameters: Signature,
        callable: F,
    ) -> u32
    where
        F: Fn(&T, &[Variant]) -> Result<Variant, CallError> + Send + Sync + 'static,
    {
        let id = self.meta.add_method(name, return_signature, parameters);
        self.methods.insert(id, erase_method(callable));
        id
    }

    /// Registers a typed signal; the getter resolves the signal field on the instance.
    pub fn signal<Ps, G>(&mut self, name: impl Into<String>, getter: G) -> u32
    where
        Ps: ParamTuple,
        G: for<'a> Fn(&'a T) -> &'a TypedSignal<Ps> + Send + Sync + 'static,
    {
        let id = self.meta.add_signal(name, Ps::signature());
        self.signal_getters
            .insert(id, erase_signal_getter(move |typed: &T| Some(getter(typed).base())));
        id
    }

    /// Registers a signal from an explicit signature and a fallible getter.
    ///
    /// A getter returning `None` surfaces as the `"Signal getter returned NULL"` error on
    /// connect/disconnect.
    pub fn signal_raw<G>(
        &mut self,
        name: impl Into<String>,
        parameters: Signature,
        getter: G,
    ) -> u32
    where
        G: for<'a> Fn(&'a T) -> Option<&'a SignalBase> + Send + Sync + 'static,
    {
        let id = self.meta.add_signal(name, parameters);
        self.signal_getters.insert(id, erase_signal_getter(getter));
        id
    }

    /// Declares a parent type with its pointer adjustment offset.
    pub fn parent(&mut self, parent: Arc<ObjectType>, offset: isize) -> &mut Self {
        self.parents.push((parent, offset));
        self
    }

    pub fn build(self) -> Arc<ObjectType> {
        Arc::new(ObjectType {
            type_id: TypeId::of::<T>(),
            type_name: any::type_name::<T>(),
            meta: self.meta.build(),
            methods: self.methods,
            signal_getters: self.signal_getters,
            parents: self.parents,
        })
    }
}

fn erase_method<T, F>(callable: F) -> ErasedMethod
where
    T: Send + Sync + 'static,
    F: Fn(&T, &[Variant]) -> Result<Variant, CallError> + Send + Sync + 'static,
{
    Arc::new(move |instance: &ErasedInstance, args: &[Variant]| {
        let typed = instance
            .downcast_ref::<T>()
            .ok_or_else(|| CallError::failed("instance type mismatch"))?;
        callable(typed, args)
    })
}

fn erase_signal_getter<T, G>(getter: G) -> ErasedSignalGetter
where
    T: Send + Sync + 'static,
    G: for<'a> Fn(&'a T) -> Option<&'a SignalBase> + Send + Sync + 'static,
{
    Arc::new(move |instance: &ErasedInstance| {
        instance.downcast_ref::<T>().and_then(|typed| getter(typed))
    })
}

/// Backend pairing an instance with its [`ObjectType`].
///
/// The instance is shared (`Arc`); several `StaticObject`s over the same instance behave like
/// aliases of one object as far as method dispatch is concerned, but carry independent event
/// loop associations.
pub struct StaticObject {
    object_type: Arc<ObjectType>,
    instance: Arc<ErasedInstance>,
    event_loop: Option<EventLoop>,
}

impl StaticObject {
    /// Pairs `instance` with its registered type.
    ///
    /// # Panics
    /// If `instance` is not of the Rust type the [`ObjectType`] was built for.
    pub fn new<T: Send + Sync + 'static>(object_type: Arc<ObjectType>, instance: Arc<T>) -> Self {
        assert_eq!(
            object_type.type_id,
            TypeId::of::<T>(),
            "instance of type `{}` does not match object type `{}`",
            any::type_name::<T>(),
            object_type.type_name,
        );
        StaticObject {
            object_type,
            instance,
            event_loop: None,
        }
    }

    /// Associates the object with an event loop; `Queued` and foreign-thread `Auto` calls are
    /// marshalled onto it.
    pub fn with_event_loop(mut self, event_loop: EventLoop) -> Self {
        self.event_loop = Some(event_loop);
        self
    }

    pub fn object_type(&self) -> &Arc<ObjectType> {
        &self.object_type
    }

    /// Wraps the backend into a shared [`Object`] handle.
    pub fn into_object(self) -> Object {
        Object::new(self)
    }

    fn signal(&self, id: u32) -> Result<&SignalBase, CallError> {
        let getter = self
            .object_type
            .signal_getters
            .get(&id)
            .ok_or(CallError::NoSuchSignal(id))?;
        getter(&*self.instance).ok_or(CallError::SignalGetterNull)
    }
}

impl ObjectBackend for StaticObject {
    fn meta_object(&self) -> &MetaObject {
        &self.object_type.meta
    }

    fn meta_call(&self, method: u32, args: &[Variant], call_type: CallType) -> Future<Variant> {
        let Some(callable) = self.object_type.methods.get(&method).cloned() else {
            return Future::from_error(CallError::NoSuchMethod.to_string());
        };
        let instance = self.instance.clone();
        let args = args.to_vec();
        dispatch_call(self.event_loop.as_ref(), call_type, move || {
            callable(&*instance, &args)
        })
    }

    fn meta_emit(&self, signal: u32, args: &[Variant]) {
        match self.signal(signal) {
            Ok(base) => base.trigger(args),
            Err(error) => tracing::error!(signal, %error, "emit failed"),
        }
    }

    fn connect(&self, signal: u32, subscriber: SignalSubscriber) -> Future<LinkId> {
        let base = match self.signal(signal) {
            Ok(base) => base,
            Err(error) => return Future::from_error(error.to_string()),
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
        let base = match self.signal(link.signal_id()) {
            Ok(base) => base,
            Err(error) => return Future::from_error(error.to_string()),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Timeout;

    struct Counter {
        start: i32,
        on_count: TypedSignal<(i32,)>,
    }

    fn counter_type() -> Arc<ObjectType> {
        let mut builder = ObjectTypeBuilder::<Counter>::new();
        builder.method("next", |c: &Counter, (step,): (i32,)| c.start + step);
        builder.signal("counted", |c: &Counter| &c.on_count);
        builder.build()
    }

    fn counter_object() -> StaticObject {
        StaticObject::new(
            counter_type(),
            Arc::new(Counter {
                start: 40,
                on_count: TypedSignal::new(),
            }),
        )
    }

    #[test]
    fn typed_method_derives_its_signatures() {
        let ty = counter_type();
        let method = ty.meta_object().find_method(
            "next",
            &Signature::new("(i)").unwrap(),
        );
        let method = method.unwrap();
        assert_eq!(method.return_signature().as_str(), "i");
        assert_eq!(method.parameters().as_str(), "(i)");
    }

    #[test]
    fn call_through_the_backend() {
        let object = counter_object();
        let result = object.meta_call(
            object.meta_object().find_method("next", &Signature::new("(i)").unwrap()).unwrap().id(),
            &[Variant::Int32(2)],
            CallType::Direct,
        );
        assert_eq!(result.value(Timeout::None), Ok(Variant::Int32(42)));
    }

    #[test]
    #[should_panic(expected = "does not match object type")]
    fn mismatched_instance_type_panics() {
        let ty = counter_type();
        let _ = StaticObject::new(ty, Arc::new(17i32));
    }

    #[test]
    fn null_signal_getter_is_reported() {
        struct Mute;
        let mut builder = ObjectTypeBuilder::<Mute>::new();
        let silent =
            builder.signal_raw("silent", Signature::new("()").unwrap(), |_m: &Mute| None);
        let object = StaticObject::new(builder.build(), Arc::new(Mute));

        let link = object.connect(silent, SignalSubscriber::new(|_| {}));
        assert_eq!(
            link.error_message(Timeout::None).as_deref(),
            Some("Signal getter returned NULL")
        );
    }

    #[test]
    fn inherits_walks_the_parent_dag() {
        struct GrandParent;
        struct ParentA;
        struct ParentB;
        struct Child;

        let grand = ObjectTypeBuilder::<GrandParent>::new().build();
        let mut builder = ObjectTypeBuilder::<ParentA>::new();
        builder.parent(grand.clone(), 8);
        let parent_a = builder.build();
        let mut builder = ObjectTypeBuilder::<ParentB>::new();
        builder.parent(grand.clone(), 24);
        let parent_b = builder.build();

        let mut builder = ObjectTypeBuilder::<Child>::new();
        builder.parent(parent_a.clone(), 0);
        builder.parent(parent_b.clone(), 16);
        let child = builder.build();

        assert_eq!(child.inherits(&child), Some(0));
        assert_eq!(child.inherits(&parent_a), Some(0));
        assert_eq!(child.inherits(&parent_b), Some(16));
        // Breadth-first: the nearest path to the shared base wins.
        assert_eq!(child.inherits(&grand), Some(8));
        assert_eq!(grand.inherits(&child), None);
    }
}
