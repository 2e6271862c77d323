/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axon::prelude::*;

fn sig(text: &str) -> Signature {
    Signature::new(text).unwrap()
}

/// A dynamic calculator object with an overloaded method and a signal.
fn calculator() -> (Object, u32, u32, u32) {
    let mut meta = MetaObject::builder();
    let add_i = meta.add_method("add", sig("i"), sig("(ii)"));
    let add_d = meta.add_method("add", sig("d"), sig("(dd)"));
    let computed = meta.add_signal("computed", sig("(i)"));

    let object = DynamicObject::new(meta.build());
    object.set_method(add_i, |args| {
        let a = i32::try_from_variant(&args[0])?;
        let b = i32::try_from_variant(&args[1])?;
        Ok((a + b).to_variant())
    });
    object.set_method(add_d, |args| {
        let a = f64::try_from_variant(&args[0])?;
        let b = f64::try_from_variant(&args[1])?;
        Ok((a + b).to_variant())
    });
    (object.into_object(), add_i, add_d, computed)
}

#[test]
fn call_by_name_resolves_the_best_overload() {
    let (object, ..) = calculator();

    let int_sum = object.call("add", &[2i32.to_variant(), 40i32.to_variant()]);
    assert_eq!(int_sum.value(Timeout::Infinite), Ok(Variant::Int32(42)));

    let float_sum = object.call("add", &[0.5f64.to_variant(), 1.0f64.to_variant()]);
    assert_eq!(float_sum.value(Timeout::Infinite), Ok(Variant::Float64(1.5)));
}

#[test]
fn call_by_name_with_unknown_method_fails() {
    let (object, ..) = calculator();
    let result = object.call("absent", &[]);
    assert_eq!(
        result.error_message(Timeout::Infinite).as_deref(),
        Some("No such method")
    );
}

#[test]
fn unknown_method_id_fails_with_the_wire_text() {
    let (object, ..) = calculator();
    let result = object.meta_call(9999, &[], CallType::Auto);
    assert_eq!(
        result.error_message(Timeout::Infinite).as_deref(),
        Some("No such method")
    );
}

#[test]
fn queued_calls_run_on_the_object_loop() {
    let runtime = Runtime::new();

    let mut meta = MetaObject::builder();
    let where_am_i = meta.add_method("where_am_i", sig("b"), sig("()"));
    let object = DynamicObject::new(meta.build())
        .with_event_loop(runtime.object_loop().clone());

    let loop_probe = runtime.object_loop().clone();
    object.set_method(where_am_i, move |_args| {
        Ok(loop_probe.is_in_loop_thread().to_variant())
    });
    let object = object.into_object();

    let queued = object.meta_call(where_am_i, &[], CallType::Queued);
    assert_eq!(queued.value(Timeout::Infinite), Ok(Variant::Bool(true)));

    // Auto from a foreign thread behaves like Queued.
    let auto = object.meta_call(where_am_i, &[], CallType::Auto);
    assert_eq!(auto.value(Timeout::Infinite), Ok(Variant::Bool(true)));

    // Direct stays on the calling thread.
    let direct = object.meta_call(where_am_i, &[], CallType::Direct);
    assert_eq!(direct.value(Timeout::None), Ok(Variant::Bool(false)));
}

#[test]
fn auto_self_call_does_not_deadlock() {
    let runtime = Runtime::new();

    let mut meta = MetaObject::builder();
    let inner = meta.add_method("inner", sig("i"), sig("()"));
    let outer = meta.add_method("outer", sig("i"), sig("()"));

    let object = DynamicObject::new(meta.build())
        .with_event_loop(runtime.object_loop().clone());
    object.set_method(inner, |_args| Ok(7i32.to_variant()));

    // The outer method calls back into its own object. With `Auto`, the nested call must
    // execute directly on the loop thread instead of queueing behind the running task.
    let self_slot: Arc<Mutex<Option<Object>>> = Arc::new(Mutex::new(None));
    let slot = self_slot.clone();
    object.set_method(outer, move |_args| {
        let me = slot.lock().unwrap().clone().expect("object registered");
        let nested = me.call("inner", &[]);
        let value = nested
            .value(Timeout::None)
            .map_err(|e| CallError::failed(e.to_string()))?;
        Ok(value)
    });

    let object = object.into_object();
    *self_slot.lock().unwrap() = Some(object.clone());

    let result = object.meta_call(outer, &[], CallType::Queued);
    assert_eq!(result.value(Timeout::Infinite), Ok(Variant::Int32(7)));
}

#[test]
fn connect_emit_disconnect_lifecycle() {
    let (object, _, _, computed) = calculator();
    let hits = Arc::new(AtomicUsize::new(0));

    let probe = hits.clone();
    let link = object
        .connect(
            computed,
            SignalSubscriber::new(move |args| {
                assert_eq!(args[0], Variant::Int32(42));
                probe.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .value(Timeout::Infinite)
        .unwrap();

    // The link id encodes (signal << 16) | subscriber.
    assert_eq!(link.signal_id(), computed);
    assert!(link.subscriber_id() < (1 << 16));
    assert_eq!(link.raw(), (computed << 16) | link.subscriber_id());

    object.meta_emit(computed, &[Variant::Int32(42)]);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    object.disconnect(link).value(Timeout::Infinite).unwrap();
    object.meta_emit(computed, &[Variant::Int32(42)]);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // Disconnecting an unknown link fails through the future.
    let error = object.disconnect(link).error_message(Timeout::Infinite);
    assert_eq!(error.as_deref(), Some("No such link"));
}

#[test]
fn connect_to_unknown_signal_fails() {
    let (object, ..) = calculator();
    let result = object.connect(777, SignalSubscriber::new(|_| {}));
    assert_eq!(
        result.error_message(Timeout::Infinite).as_deref(),
        Some("No such signal 777")
    );
}

#[test]
fn dead_weak_subscribers_are_skipped() {
    let (emitter, _, _, computed) = calculator();
    let (listener, ..) = calculator();
    let hits = Arc::new(AtomicUsize::new(0));

    let probe = hits.clone();
    emitter
        .connect(
            computed,
            SignalSubscriber::new(move |_args| {
                probe.fetch_add(1, Ordering::SeqCst);
            })
            .bound_to(&listener),
        )
        .value(Timeout::Infinite)
        .unwrap();

    emitter.meta_emit(computed, &[Variant::Int32(42)]);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    drop(listener);
    emitter.meta_emit(computed, &[Variant::Int32(42)]);
    assert_eq!(hits.load(Ordering::SeqCst), 1, "dead subscriber must be skipped");
}

#[test]
fn static_object_surface() {
    struct Motor {
        max_speed: f64,
        on_speed: TypedSignal<(f64,)>,
    }

    let mut builder = ObjectTypeBuilder::<Motor>::new();
    let clamp = builder.method("clamp", |m: &Motor, (wanted,): (f64,)| {
        wanted.min(m.max_speed)
    });
    let speed_changed = builder.signal("speed_changed", |m: &Motor| &m.on_speed);
    let motor_type = builder.build();

    let motor = Arc::new(Motor {
        max_speed: 2.5,
        on_speed: TypedSignal::new(),
    });
    let object = StaticObject::new(motor_type, motor.clone()).into_object();

    // Typed registration derived the signatures.
    let method = object.meta_object().method(clamp).unwrap();
    assert_eq!(method.parameters().as_str(), "(d)");
    assert_eq!(method.return_signature().as_str(), "d");

    let clamped = object.call("clamp", &[9.0f64.to_variant()]);
    assert_eq!(clamped.value(Timeout::Infinite), Ok(Variant::Float64(2.5)));

    // Emission through the backend reaches subscribers of the instance's signal field, and
    // emitting on the field reaches subscribers connected through the backend.
    let seen = Arc::new(Mutex::new(Vec::new()));
    let probe = seen.clone();
    motor.on_speed.connect(move |(speed,)| {
        probe.lock().unwrap().push(speed);
    });

    object.meta_emit(speed_changed, &[Variant::Float64(1.25)]);
    motor.on_speed.emit((0.5,));
    assert_eq!(*seen.lock().unwrap(), vec![1.25, 0.5]);
}
