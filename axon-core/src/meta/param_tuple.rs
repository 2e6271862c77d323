/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::builtin::{TypedVariant, Variant};
use crate::meta::error::CallError;
use crate::meta::Signature;

/// Represents a parameter list as a Rust tuple where each element is one parameter.
///
/// Implemented for tuples of up to eight [`TypedVariant`] elements. This is what typed method
/// registration and typed signals are built from: the tuple provides the static signature for
/// the meta-object and the conversions between Rust values and the variant argument list.
pub trait ParamTuple: Send + Sized + 'static {
    /// The number of elements in this parameter list.
    const LEN: usize;

    /// The parameter list as a tuple signature, e.g. `(is)`.
    fn signature() -> Signature;

    fn to_variants(self) -> Vec<Variant>;

    /// Converts an argument list, checking length and element types.
    fn from_variants(args: &[Variant]) -> Result<Self, CallError>;
}

macro_rules! impl_param_tuple {
    ($len:literal; $($p:ident : $n:tt),*) => {
        impl<$($p),*> ParamTuple for ($($p,)*)
        where
            $($p: TypedVariant + Send + 'static,)*
        {
            const LEN: usize = $len;

            fn signature() -> Signature {
                #[allow(unused_mut)]
                let mut text = String::from("(");
                $( text.push_str($p::static_signature().as_str()); )*
                text.push(')');
                Signature::from_validated(&text)
            }

            fn to_variants(self) -> Vec<Variant> {
                vec![ $( self.$n.to_variant() ),* ]
            }

            fn from_variants(args: &[Variant]) -> Result<Self, CallError> {
                if args.len() != $len {
                    return Err(CallError::ArgumentCount {
                        expected: $len,
                        actual: args.len(),
                    });
                }
                Ok(( $(
                    $p::try_from_variant(&args[$n]).map_err(|inner| CallError::BadArgument {
                        index: $n,
                        inner,
                    })?,
                )* ))
            }
        }
    };
}

impl_param_tuple!(0;);
impl_param_tuple!(1; A: 0);
impl_param_tuple!(2; A: 0, B: 1);
impl_param_tuple!(3; A: 0, B: 1, C: 2);
impl_param_tuple!(4; A: 0, B: 1, C: 2, D: 3);
impl_param_tuple!(5; A: 0, B: 1, C: 2, D: 3, E: 4);
impl_param_tuple!(6; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
impl_param_tuple!(7; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
impl_param_tuple!(8; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tuple_signature() {
        assert_eq!(<() as ParamTuple>::signature().as_str(), "()");
        assert_eq!(<() as ParamTuple>::LEN, 0);
    }

    #[test]
    fn mixed_tuple_signature() {
        type Params = (i32, String, Vec<f64>);
        assert_eq!(Params::signature().as_str(), "(is[d])");
        assert_eq!(Params::LEN, 3);
    }

    #[test]
    fn variants_round_trip() {
        let args = (7i32, "hi".to_string()).to_variants();
        assert_eq!(args, vec![Variant::Int32(7), Variant::String("hi".into())]);

        let back = <(i32, String)>::from_variants(&args).unwrap();
        assert_eq!(back, (7, "hi".to_string()));
    }

    #[test]
    fn length_mismatch_is_reported() {
        let err = <(i32,)>::from_variants(&[]).unwrap_err();
        assert_eq!(
            err,
            CallError::ArgumentCount {
                expected: 1,
                actual: 0
            }
        );
    }

    #[test]
    fn element_mismatch_names_the_index() {
        let args = [Variant::Int32(1), Variant::Int32(2)];
        let err = <(i32, String)>::from_variants(&args).unwrap_err();
        assert!(matches!(err, CallError::BadArgument { index: 1, .. }));
    }
}
