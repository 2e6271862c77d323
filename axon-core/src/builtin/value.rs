/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::meta::{Signature, TypeKind};
use crate::obj::Object;

/// Type-erased value travelling through meta calls and signals.
///
/// Every variant kind corresponds to one [`TypeKind`] of the signature grammar, so any value
/// can describe itself via [`signature()`][Self::signature]. Maps preserve insertion order and
/// are represented as pair lists; key uniqueness is the producer's concern, the runtime only
/// moves values around.
#[derive(Clone, Debug, PartialEq)]
pub enum Variant {
    Void,
    Bool(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    String(String),
    /// Opaque byte buffer, serialized without per-element framing.
    Raw(Vec<u8>),
    List(Vec<Variant>),
    Map(Vec<(Variant, Variant)>),
    Tuple(Vec<Variant>),
    /// A value whose type is only known at runtime.
    Dynamic(Box<Variant>),
    Object(Object),
}

impl Variant {
    pub fn kind(&self) -> TypeKind {
        match self {
            Variant::Void => TypeKind::Void,
            Variant::Bool(_) => TypeKind::Bool,
            Variant::Int8(_) => TypeKind::Int8,
            Variant::UInt8(_) => TypeKind::UInt8,
            Variant::Int16(_) => TypeKind::Int16,
            Variant::UInt16(_) => TypeKind::UInt16,
            Variant::Int32(_) => TypeKind::Int32,
            Variant::UInt32(_) => TypeKind::UInt32,
            Variant::Int64(_) => TypeKind::Int64,
            Variant::UInt64(_) => TypeKind::UInt64,
            Variant::Float32(_) => TypeKind::Float32,
            Variant::Float64(_) => TypeKind::Float64,
            Variant::String(_) => TypeKind::String,
            Variant::Raw(_) => TypeKind::Raw,
            Variant::List(_) => TypeKind::List,
            Variant::Map(_) => TypeKind::Map,
            Variant::Tuple(_) => TypeKind::Tuple,
            Variant::Dynamic(_) => TypeKind::Dynamic,
            Variant::Object(_) => TypeKind::Object,
        }
    }

    /// The signature describing this value's runtime type.
    ///
    /// Heterogeneous containers degrade their element type to `Dynamic`; empty containers use
    /// the `None` placeholder, which converts to anything.
    pub fn signature(&self) -> Signature {
        let mut text = String::new();
        self.write_signature(&mut text);
        Signature::from_validated(&text)
    }

    fn write_signature(&self, out: &mut String) {
        match self {
            Variant::List(items) => {
                out.push('[');
                Self::write_common_signature(items, out);
                out.push(']');
            }
            Variant::Map(pairs) => {
                out.push('{');
                // Key and value type are each the common type over all entries.
                let keys: Vec<&Variant> = pairs.iter().map(|(k, _)| k).collect();
                let values: Vec<&Variant> = pairs.iter().map(|(_, v)| v).collect();
                Self::write_common_signature_refs(&keys, out);
                Self::write_common_signature_refs(&values, out);
                out.push('}');
            }
            Variant::Tuple(items) => {
                out.push('(');
                for item in items {
                    item.write_signature(out);
                }
                out.push(')');
            }
            other => out.push(other.kind().code()),
        }
    }

    fn write_common_signature(items: &[Variant], out: &mut String) {
        let refs: Vec<&Variant> = items.iter().collect();
        Self::write_common_signature_refs(&refs, out);
    }

    fn write_common_signature_refs(items: &[&Variant], out: &mut String) {
        match items {
            [] => out.push(TypeKind::None.code()),
            [first, rest @ ..] => {
                let first_sig = first.signature();
                if rest.iter().all(|item| item.signature() == first_sig) {
                    out.push_str(first_sig.as_str());
                } else {
                    out.push(TypeKind::Dynamic.code());
                }
            }
        }
    }

    /// The tuple signature of an argument list, e.g. `(is)`.
    pub fn args_signature(args: &[Variant]) -> Signature {
        let mut text = String::from("(");
        for arg in args {
            arg.write_signature(&mut text);
        }
        text.push(')');
        Signature::from_validated(&text)
    }
}
