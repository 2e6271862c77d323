/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Object backends and signal registration.
//!
//! [`DynamicObject`] builds its method table at runtime; [`StaticObject`] pairs an instance
//! with a frozen [`ObjectType`] description registered once per Rust type. Both present the
//! uniform [`ObjectBackend`][crate::obj::ObjectBackend] surface.

mod dynamic_object;
pub mod signal;
mod static_object;

pub use dynamic_object::{DynamicMethod, DynamicObject};
pub use static_object::{ObjectType, ObjectTypeBuilder, StaticObject};

use crate::builtin::Variant;
use crate::meta::CallError;
use crate::obj::CallType;
use crate::task::{EventLoop, Future, Promise, Timeout};

/// Runs `call` according to `call_type`, marshalling onto `target` when queued.
///
/// `Auto` resolves to direct execution when the object has no loop or the caller is already on
/// it; an `Auto` call an object makes to itself therefore completes before the calling frame
/// resumes. `Queued` without a loop degrades to direct execution as well.
pub(crate) fn dispatch_call<F>(
    target: Option<&EventLoop>,
    call_type: CallType,
    call: F,
) -> Future<Variant>
where
    F: FnOnce() -> Result<Variant, CallError> + Send + 'static,
{
    let direct = match call_type {
        CallType::Direct => true,
        CallType::Queued => target.is_none(),
        CallType::Auto => target.map_or(true, EventLoop::is_in_loop_thread),
    };

    if direct {
        return match call() {
            Ok(value) => Future::from_value(value),
            Err(error) => Future::from_error(error.to_string()),
        };
    }

    let target = target.expect("queued dispatch requires a loop");
    let promise = Promise::new();
    let future = promise.future();

    let task_promise = promise.clone();
    let posted = target.post(move || match call() {
        Ok(value) => task_promise.set_value(value),
        Err(error) => task_promise.set_error(error.to_string()),
    });
    // If the task never completes normally (loop stopped, callable panicked), surface that on
    // the call future instead of leaving the caller pending forever. In both cases the call
    // promise is still unset, so no double-set can occur.
    posted.connect(move |task| {
        if task.has_error(Timeout::None) == Ok(true) {
            promise.set_error(task.error_message(Timeout::None).unwrap_or_default());
        }
    });

    future
}
