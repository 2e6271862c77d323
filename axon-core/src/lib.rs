/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! # Internal crate of **axon**
//!
//! Do not depend on this crate directly, instead use the `axon` crate.
//! No SemVer or other guarantees are provided.

// Note that a lot of those are public, but the axon crate still has the final say on what it wants to re-export.
// Doing fine-grained visibility restrictions on every level is a useless maintenance chore.
pub mod builtin;
pub mod meta;
pub mod obj;
pub mod registry;
pub mod task;
