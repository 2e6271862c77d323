/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::collections::HashMap;
use std::hash::Hash;

use crate::builtin::Variant;
use crate::meta::{ConvertError, Signature};

/// Infallible conversion of a Rust value into a [`Variant`].
pub trait ToVariant {
    fn to_variant(&self) -> Variant;
}

/// Fallible conversion of a [`Variant`] back into a Rust value.
///
/// Integer conversions accept any integer kind whose value fits the target (the signature
/// already scored the conversion; here only the actual value matters).
pub trait FromVariant: Sized {
    fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError>;
}

/// A conversion pair with a statically known signature; what typed APIs are built from.
pub trait TypedVariant: ToVariant + FromVariant {
    fn static_signature() -> Signature;
}

fn convert_error(variant: &Variant, target: &str) -> ConvertError {
    ConvertError::new(variant.signature().as_str(), target)
}

impl Variant {
    /// The numeric value of any integer kind, for range-checked narrowing.
    fn integer_value(&self) -> Option<i128> {
        Some(match *self {
            Variant::Int8(v) => v as i128,
            Variant::UInt8(v) => v as i128,
            Variant::Int16(v) => v as i128,
            Variant::UInt16(v) => v as i128,
            Variant::Int32(v) => v as i128,
            Variant::UInt32(v) => v as i128,
            Variant::Int64(v) => v as i128,
            Variant::UInt64(v) => v as i128,
            _ => return None,
        })
    }
}

macro_rules! impl_integer_conversions {
    ($($ty:ty => $variant:ident, $sig:literal;)*) => {
        $(
            impl ToVariant for $ty {
                fn to_variant(&self) -> Variant {
                    Variant::$variant(*self)
                }
            }

            impl FromVariant for $ty {
                fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
                    variant
                        .integer_value()
                        .and_then(|wide| <$ty>::try_from(wide).ok())
                        .ok_or_else(|| convert_error(variant, $sig))
                }
            }

            impl TypedVariant for $ty {
                fn static_signature() -> Signature {
                    Signature::from_validated($sig)
                }
            }
        )*
    };
}

impl_integer_conversions! {
    i8 => Int8, "c";
    u8 => UInt8, "C";
    i16 => Int16, "w";
    u16 => UInt16, "W";
    i32 => Int32, "i";
    u32 => UInt32, "I";
    i64 => Int64, "l";
    u64 => UInt64, "L";
}

impl ToVariant for bool {
    fn to_variant(&self) -> Variant {
        Variant::Bool(*self)
    }
}

impl FromVariant for bool {
    fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
        match variant {
            Variant::Bool(v) => Ok(*v),
            other => Err(convert_error(other, "b")),
        }
    }
}

impl TypedVariant for bool {
    fn static_signature() -> Signature {
        Signature::from_validated("b")
    }
}

impl ToVariant for f32 {
    fn to_variant(&self) -> Variant {
        Variant::Float32(*self)
    }
}

impl FromVariant for f32 {
    fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
        match variant {
            Variant::Float32(v) => Ok(*v),
            Variant::Float64(v) => Ok(*v as f32),
            other => Err(convert_error(other, "f")),
        }
    }
}

impl TypedVariant for f32 {
    fn static_signature() -> Signature {
        Signature::from_validated("f")
    }
}

impl ToVariant for f64 {
    fn to_variant(&self) -> Variant {
        Variant::Float64(*self)
    }
}

impl FromVariant for f64 {
    fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
        match variant {
            Variant::Float32(v) => Ok(*v as f64),
            Variant::Float64(v) => Ok(*v),
            other => Err(convert_error(other, "d")),
        }
    }
}

impl TypedVariant for f64 {
    fn static_signature() -> Signature {
        Signature::from_validated("d")
    }
}

impl ToVariant for String {
    fn to_variant(&self) -> Variant {
        Variant::String(self.clone())
    }
}

impl FromVariant for String {
    fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
        match variant {
            Variant::String(v) => Ok(v.clone()),
            other => Err(convert_error(other, "s")),
        }
    }
}

impl TypedVariant for String {
    fn static_signature() -> Signature {
        Signature::from_validated("s")
    }
}

impl ToVariant for &str {
    fn to_variant(&self) -> Variant {
        Variant::String((*self).to_string())
    }
}

impl ToVariant for () {
    fn to_variant(&self) -> Variant {
        Variant::Void
    }
}

impl FromVariant for () {
    fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
        match variant {
            Variant::Void => Ok(()),
            other => Err(convert_error(other, "v")),
        }
    }
}

impl TypedVariant for () {
    fn static_signature() -> Signature {
        Signature::from_validated("v")
    }
}

// A Variant is trivially its own dynamic representation.
impl ToVariant for Variant {
    fn to_variant(&self) -> Variant {
        self.clone()
    }
}

impl FromVariant for Variant {
    fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
        Ok(variant.clone())
    }
}

impl TypedVariant for Variant {
    fn static_signature() -> Signature {
        Signature::from_validated("m")
    }
}

impl<T: ToVariant> ToVariant for Vec<T> {
    fn to_variant(&self) -> Variant {
        Variant::List(self.iter().map(ToVariant::to_variant).collect())
    }
}

impl<T: FromVariant> FromVariant for Vec<T> {
    fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
        match variant {
            Variant::List(items) => items.iter().map(T::try_from_variant).collect(),
            other => Err(convert_error(other, "[..]")),
        }
    }
}

impl<T: TypedVariant> TypedVariant for Vec<T> {
    fn static_signature() -> Signature {
        Signature::from_validated(&format!("[{}]", T::static_signature()))
    }
}

impl<K: ToVariant, V: ToVariant> ToVariant for HashMap<K, V> {
    fn to_variant(&self) -> Variant {
        Variant::Map(
            self.iter()
                .map(|(k, v)| (k.to_variant(), v.to_variant()))
                .collect(),
        )
    }
}

impl<K: FromVariant + Eq + Hash, V: FromVariant> FromVariant for HashMap<K, V> {
    fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
        match variant {
            Variant::Map(pairs) => pairs
                .iter()
                .map(|(k, v)| Ok((K::try_from_variant(k)?, V::try_from_variant(v)?)))
                .collect(),
            other => Err(convert_error(other, "{..}")),
        }
    }
}

impl<K: TypedVariant + Eq + Hash, V: TypedVariant> TypedVariant for HashMap<K, V> {
    fn static_signature() -> Signature {
        Signature::from_validated(&format!(
            "{{{}{}}}",
            K::static_signature(),
            V::static_signature()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_round_trip() {
        assert_eq!(i32::try_from_variant(&42i32.to_variant()), Ok(42));
        assert_eq!(bool::try_from_variant(&true.to_variant()), Ok(true));
        assert_eq!(f64::try_from_variant(&0.5f64.to_variant()), Ok(0.5));
        assert_eq!(
            String::try_from_variant(&"hello".to_variant()),
            Ok("hello".to_string())
        );
        assert_eq!(<()>::try_from_variant(&().to_variant()), Ok(()));
    }

    #[test]
    fn integers_narrow_when_the_value_fits() {
        assert_eq!(u8::try_from_variant(&Variant::Int64(200)), Ok(200));
        assert!(u8::try_from_variant(&Variant::Int64(300)).is_err());
        assert!(u32::try_from_variant(&Variant::Int32(-1)).is_err());
        assert_eq!(i64::try_from_variant(&Variant::UInt8(7)), Ok(7));
    }

    #[test]
    fn mismatched_kinds_are_rejected() {
        let err = i32::try_from_variant(&Variant::String("nope".into())).unwrap_err();
        assert_eq!(err.to_string(), "cannot convert s to i");
    }

    #[test]
    fn vectors_round_trip() {
        let v = vec![1i32, 2, 3];
        let variant = v.to_variant();
        assert_eq!(variant.signature().as_str(), "[i]");
        assert_eq!(Vec::<i32>::try_from_variant(&variant), Ok(v));
    }

    #[test]
    fn maps_round_trip() {
        let mut m = HashMap::new();
        m.insert("one".to_string(), 1u32);
        m.insert("two".to_string(), 2u32);
        let variant = m.to_variant();
        assert_eq!(variant.signature().as_str(), "{sI}");
        assert_eq!(HashMap::<String, u32>::try_from_variant(&variant), Ok(m));
    }

    #[test]
    fn static_signatures_compose() {
        assert_eq!(Vec::<i32>::static_signature().as_str(), "[i]");
        assert_eq!(
            HashMap::<String, Vec<u8>>::static_signature().as_str(),
            "{s[C]}"
        );
        assert_eq!(Variant::static_signature().as_str(), "m");
    }
}
