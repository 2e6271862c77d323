/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Fundamental type information: signatures, meta-objects and call errors.
//!
//! A [`Signature`] is the textual interchange format for types -- both a compatibility
//! descriptor (overload resolution, [`Signature::is_convertible_to`]) and a serialization
//! directive for the transport. A [`MetaObject`] is the frozen, self-describing schema of an
//! object's methods and signals, keyed by the numeric ids that travel on the wire.

mod error;
mod meta_object;
mod param_tuple;
mod signature;

pub use error::{CallError, ConvertError};
pub use meta_object::{MetaMethod, MetaObject, MetaObjectBuilder, MetaSignal, FIRST_USER_ID};
pub use param_tuple::ParamTuple;
pub use signature::{
    signature_split, Signature, SignatureElement, SignatureIter, SignatureParseError, TypeKind,
};
