/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Built-in value types: the type-erased [`Variant`] and its conversion traits.

mod convert;
mod value;

pub use convert::{FromVariant, ToVariant, TypedVariant};
pub use value::Variant;
