/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Object handles and the uniform call/emit/connect surface.
//!
//! An [`Object`] is a shared handle to some backend implementing [`ObjectBackend`]; the two
//! provided backends live in [`crate::registry`]. [`WeakObject`] breaks subscriber reference
//! cycles, [`LinkId`] identifies signal connections across the wire.

mod link_id;
mod object;

pub use link_id::LinkId;
pub use object::{CallType, Object, ObjectBackend, WeakObject};
