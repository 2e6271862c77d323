/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! # axon -- core runtime of a robotics messaging middleware
//!
//! Nodes register named services, other nodes discover and invoke them, and objects expose
//! methods and signals across process boundaries. This crate is the **core runtime** that makes
//! remote and local object interaction uniform; transports and the name directory build on top
//! of it and are not part of this crate.
//!
//!
//! ## Module organization
//!
//! * [`task`]: event loops and the future/promise primitive -- [`task::Future`],
//!   [`task::Promise`], the blocking-on-drop [`task::FutureSync`] and the barrier combinators.
//! * [`meta`]: type information -- the textual [`meta::Signature`] grammar with its
//!   convertibility scoring, and the self-describing [`meta::MetaObject`].
//! * [`builtin`]: the type-erased [`builtin::Variant`] value and its conversion traits.
//! * [`obj`]: shared [`obj::Object`] handles and the uniform call/emit/connect surface.
//! * [`registry`]: the two object backends ([`registry::DynamicObject`] and
//!   [`registry::StaticObject`]) and the signal/slot machinery.
//!
//! The [`prelude`] contains often-imported symbols; feel free to `use axon::prelude::*`.
//!
//!
//! ## Cargo features
//!
//! * **`serde`**: serialization of object descriptions ([`meta::MetaObject`],
//!   [`meta::Signature`]), so a directory service can ship them between nodes.

pub use axon_core::builtin;
pub use axon_core::meta;
pub use axon_core::obj;
pub use axon_core::registry;
pub use axon_core::task;

/// Often-imported symbols.
pub mod prelude {
    pub use crate::builtin::{FromVariant, ToVariant, TypedVariant, Variant};
    pub use crate::meta::{
        CallError, MetaMethod, MetaObject, MetaObjectBuilder, MetaSignal, ParamTuple, Signature,
        TypeKind,
    };
    pub use crate::obj::{CallType, LinkId, Object, ObjectBackend, WeakObject};
    pub use crate::registry::signal::{
        DispatchMode, SignalBase, SignalSubscriber, SubscriberId, TypedSignal,
    };
    pub use crate::registry::{DynamicObject, ObjectType, ObjectTypeBuilder, StaticObject};
    pub use crate::task::{
        wait_for_all, wait_for_first, EventLoop, Future, FutureBarrier, FutureError, FutureState,
        FutureSync, Promise, Runtime, Timeout,
    };
}
