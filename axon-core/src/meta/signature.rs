/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::error::Error;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Kind of a single signature element.
///
/// Each kind maps to one character of the textual grammar; containers additionally carry
/// children between their bracket pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Placeholder for the element type of an empty container.
    None,
    Bool,
    Int8,
    UInt8,
    Void,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    String,
    List,
    Map,
    Tuple,
    Dynamic,
    Raw,
    /// Legacy untyped pointer; kept only so existing descriptions keep parsing.
    Pointer,
    Object,
    Unknown,
}

impl TypeKind {
    /// The character encoding this kind in the grammar (the opening bracket for containers).
    pub fn code(self) -> char {
        match self {
            TypeKind::None => '_',
            TypeKind::Bool => 'b',
            TypeKind::Int8 => 'c',
            TypeKind::UInt8 => 'C',
            TypeKind::Void => 'v',
            TypeKind::Int16 => 'w',
            TypeKind::UInt16 => 'W',
            TypeKind::Int32 => 'i',
            TypeKind::UInt32 => 'I',
            TypeKind::Int64 => 'l',
            TypeKind::UInt64 => 'L',
            TypeKind::Float32 => 'f',
            TypeKind::Float64 => 'd',
            TypeKind::String => 's',
            TypeKind::List => '[',
            TypeKind::Map => '{',
            TypeKind::Tuple => '(',
            TypeKind::Dynamic => 'm',
            TypeKind::Raw => 'r',
            TypeKind::Pointer => '*',
            TypeKind::Object => 'o',
            TypeKind::Unknown => 'X',
        }
    }

    fn from_code(code: u8) -> Option<TypeKind> {
        Some(match code {
            b'_' => TypeKind::None,
            b'b' => TypeKind::Bool,
            b'c' => TypeKind::Int8,
            b'C' => TypeKind::UInt8,
            b'v' => TypeKind::Void,
            b'w' => TypeKind::Int16,
            b'W' => TypeKind::UInt16,
            b'i' => TypeKind::Int32,
            b'I' => TypeKind::UInt32,
            b'l' => TypeKind::Int64,
            b'L' => TypeKind::UInt64,
            b'f' => TypeKind::Float32,
            b'd' => TypeKind::Float64,
            b's' => TypeKind::String,
            b'[' => TypeKind::List,
            b'{' => TypeKind::Map,
            b'(' => TypeKind::Tuple,
            b'm' => TypeKind::Dynamic,
            b'r' => TypeKind::Raw,
            b'*' => TypeKind::Pointer,
            b'o' => TypeKind::Object,
            b'X' => TypeKind::Unknown,
            _ => return None,
        })
    }

    /// `(is_float, is_signed, width rank)` for kinds participating in numeric conversion.
    fn numeric_traits(self) -> Option<(bool, bool, i32)> {
        Some(match self {
            TypeKind::Bool => (false, false, 0),
            TypeKind::Int8 => (false, true, 1),
            TypeKind::UInt8 => (false, false, 1),
            TypeKind::Int16 => (false, true, 2),
            TypeKind::UInt16 => (false, false, 2),
            TypeKind::Int32 => (false, true, 3),
            TypeKind::UInt32 => (false, false, 3),
            TypeKind::Int64 => (false, true, 4),
            TypeKind::UInt64 => (false, false, 4),
            TypeKind::Float32 => (true, true, 3),
            TypeKind::Float64 => (true, true, 4),
            _ => return None,
        })
    }
}

/// Error describing why a signature string failed to parse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureParseError {
    text: String,
    pos: usize,
    message: &'static str,
}

impl SignatureParseError {
    fn new(text: &str, pos: usize, message: &'static str) -> Self {
        SignatureParseError {
            text: text.to_string(),
            pos,
            message,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

impl fmt::Display for SignatureParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid signature {:?}: {} at offset {}",
            self.text, self.message, self.pos
        )
    }
}

impl Error for SignatureParseError {}

/// Immutable parsed form of a type signature string.
///
/// A signature is a sequence of *elements*, each a primitive kind or a container with children,
/// optionally followed by a `<...>` annotation. The string is validated once at construction;
/// clones share the text.
///
/// ```
/// use axon_core::meta::{Signature, TypeKind};
///
/// let sig = Signature::new("(is[f])").unwrap();
/// let tuple = sig.iter().next().unwrap();
/// assert_eq!(tuple.kind(), TypeKind::Tuple);
/// assert_eq!(tuple.children().size(), 3);
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    text: Arc<str>,
}

impl Signature {
    /// Parses and validates `text`.
    pub fn new(text: impl AsRef<str>) -> Result<Self, SignatureParseError> {
        let text = text.as_ref();
        validate(text)?;
        Ok(Signature { text: text.into() })
    }

    /// Wraps text that is already known to be valid (a slice of a validated signature).
    pub(crate) fn from_validated(text: &str) -> Self {
        debug_assert!(validate(text).is_ok(), "invalid pre-validated signature");
        Signature { text: text.into() }
    }

    /// The empty signature (zero elements).
    pub fn empty() -> Self {
        Signature { text: "".into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Number of top-level elements.
    pub fn size(&self) -> usize {
        self.iter().count()
    }

    pub fn iter(&self) -> SignatureIter<'_> {
        SignatureIter { rest: &self.text }
    }

    /// Score in `[0, 1]` for converting values of this signature into `target`.
    ///
    /// `1.0` means identical, `0.0` impossible. Signatures of different length are never
    /// convertible; otherwise the score is the product of the per-element scores:
    ///
    /// - numeric to numeric decays with distance (signedness flip, integer/floating crossing,
    ///   narrowing and widening each penalize);
    /// - containers of the same shape multiply their children's scores;
    /// - `Dynamic` accepts (and provides) anything at a discount;
    /// - `None` matches anything: it only describes empty containers, which carry no evidence;
    /// - everything else converts only to itself. Annotations never affect the score.
    pub fn is_convertible_to(&self, target: &Signature) -> f32 {
        if self.text == target.text {
            return 1.0;
        }
        convertibility(self.iter(), target.iter())
    }
}

fn convertibility(a: SignatureIter<'_>, b: SignatureIter<'_>) -> f32 {
    let a: Vec<_> = a.collect();
    let b: Vec<_> = b.collect();
    if a.len() != b.len() {
        return 0.0;
    }
    let mut score = 1.0;
    for (src, dst) in a.iter().zip(&b) {
        score *= element_score(src, dst);
        if score == 0.0 {
            return 0.0;
        }
    }
    score
}

fn element_score(src: &SignatureElement<'_>, dst: &SignatureElement<'_>) -> f32 {
    use TypeKind as K;

    let (ks, kd) = (src.kind(), dst.kind());
    if ks == K::None || kd == K::None {
        return 1.0;
    }
    if ks == K::Dynamic || kd == K::Dynamic {
        return if ks == kd { 1.0 } else { 0.5 };
    }
    if let (Some((fs, ss, rs)), Some((fd, sd, rd))) =
        (ks.numeric_traits(), kd.numeric_traits())
    {
        let mut score: f32 = 1.0;
        if fs != fd {
            score *= 0.5;
        }
        if !fs && !fd && ss != sd {
            score *= 0.8;
        }
        if rd > rs {
            score *= 0.95f32.powi(rd - rs);
        } else if rd < rs {
            score *= 0.6f32.powi(rs - rd);
        }
        return score;
    }
    match (ks, kd) {
        (K::List, K::List) | (K::Map, K::Map) | (K::Tuple, K::Tuple) => {
            convertibility(src.children_iter(), dst.children_iter())
        }
        _ if ks == kd => 1.0,
        _ => 0.0,
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({:?})", &*self.text)
    }
}

impl FromStr for Signature {
    type Err = SignatureParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Signature::new(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Signature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Signature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = <String as serde::Deserialize>::deserialize(deserializer)?;
        Signature::new(&text).map_err(serde::de::Error::custom)
    }
}

/// One element of a [`Signature`]; a borrowed view into the signature text.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SignatureElement<'a> {
    text: &'a str,
}

impl<'a> SignatureElement<'a> {
    /// The element's full text, including children and annotation.
    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn kind(&self) -> TypeKind {
        TypeKind::from_code(self.text.as_bytes()[0]).expect("validated element")
    }

    /// The `<...>` annotation content, if present.
    pub fn annotation(&self) -> Option<&'a str> {
        let bytes = self.text.as_bytes();
        if bytes[bytes.len() - 1] != b'>' {
            return None;
        }
        // Walk back to the opening '<' at bracket depth zero.
        let mut depth = 0usize;
        for (idx, &b) in bytes.iter().enumerate().rev() {
            match b {
                b'>' | b')' | b']' | b'}' => depth += 1,
                b'<' | b'(' | b'[' | b'{' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&self.text[idx + 1..self.text.len() - 1]);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// The children of a container element, as a signature; empty for non-containers.
    pub fn children(&self) -> Signature {
        Signature::from_validated(self.children_text())
    }

    fn children_iter(&self) -> SignatureIter<'a> {
        SignatureIter {
            rest: self.children_text(),
        }
    }

    fn children_text(&self) -> &'a str {
        match self.kind() {
            TypeKind::List | TypeKind::Map | TypeKind::Tuple => {
                let bytes = self.text.as_bytes();
                let close = matching_close(bytes, 0);
                &self.text[1..close]
            }
            _ => "",
        }
    }
}

/// Iterator over the top-level elements of a signature.
#[derive(Clone)]
pub struct SignatureIter<'a> {
    rest: &'a str,
}

impl<'a> Iterator for SignatureIter<'a> {
    type Item = SignatureElement<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let len = element_len(self.rest.as_bytes(), 0);
        let (element, rest) = self.rest.split_at(len);
        self.rest = rest;
        Some(SignatureElement { text: element })
    }
}

// ----------------------------------------------------------------------------------------------------------------------------------------------
// Validation and scanning over raw bytes. The scanners assume validated input.

/// Index of the bracket closing the one at `open` (assumes validated input).
fn matching_close(bytes: &[u8], open: usize) -> usize {
    let mut depth = 0usize;
    for (idx, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'(' | b'[' | b'{' | b'<' => depth += 1,
            b')' | b']' | b'}' | b'>' => {
                depth -= 1;
                if depth == 0 {
                    return idx;
                }
            }
            _ => {}
        }
    }
    bytes.len() - 1
}

/// Length of the element starting at `pos`, annotation included (assumes validated input).
fn element_len(bytes: &[u8], pos: usize) -> usize {
    let mut end = match bytes[pos] {
        b'[' | b'{' | b'(' => matching_close(bytes, pos) + 1,
        _ => pos + 1,
    };
    if end < bytes.len() && bytes[end] == b'<' {
        end = matching_close(bytes, end) + 1;
    }
    end - pos
}

fn validate(text: &str) -> Result<(), SignatureParseError> {
    let bytes = text.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        pos = validate_element(text, bytes, pos)?;
    }
    Ok(())
}

fn validate_element(text: &str, bytes: &[u8], pos: usize) -> Result<usize, SignatureParseError> {
    let err = |pos, message| Err(SignatureParseError::new(text, pos, message));
    let Some(&first) = bytes.get(pos) else {
        return err(pos, "expected an element");
    };

    let mut next = match first {
        b'[' => {
            let inner = validate_element(text, bytes, pos + 1)?;
            if bytes.get(inner) != Some(&b']') {
                return err(inner, "expected ']' closing the list element");
            }
            inner + 1
        }
        b'{' => {
            let key = validate_element(text, bytes, pos + 1)?;
            let value = validate_element(text, bytes, key)?;
            if bytes.get(value) != Some(&b'}') {
                return err(value, "expected '}' closing the map element");
            }
            value + 1
        }
        b'(' => {
            // A tuple may be empty: methods without parameters are described as "()".
            let mut inner = pos + 1;
            while bytes.get(inner) != Some(&b')') {
                if inner >= bytes.len() {
                    return err(inner, "expected ')' closing the tuple element");
                }
                inner = validate_element(text, bytes, inner)?;
            }
            inner + 1
        }
        code if TypeKind::from_code(code).is_some() => pos + 1,
        _ => return err(pos, "unknown type character"),
    };

    if bytes.get(next) == Some(&b'<') {
        next = validate_annotation(text, bytes, next)?;
    }
    Ok(next)
}

/// Validates a `<...>` annotation: arbitrary bytes except NUL, all bracket pairs balanced.
fn validate_annotation(text: &str, bytes: &[u8], open: usize) -> Result<usize, SignatureParseError> {
    let err = |pos, message| Err(SignatureParseError::new(text, pos, message));
    let mut stack: Vec<u8> = Vec::new();
    let mut pos = open;
    while pos < bytes.len() {
        let b = bytes[pos];
        match b {
            0 => return err(pos, "NUL byte inside annotation"),
            b'(' | b'[' | b'{' | b'<' => stack.push(b),
            b')' | b']' | b'}' | b'>' => {
                let expected = match b {
                    b')' => b'(',
                    b']' => b'[',
                    b'}' => b'{',
                    _ => b'<',
                };
                if stack.pop() != Some(expected) {
                    return err(pos, "unbalanced bracket inside annotation");
                }
                if stack.is_empty() {
                    return Ok(pos + 1);
                }
            }
            _ => {}
        }
        pos += 1;
    }
    err(pos, "unterminated annotation")
}

/// Splits a full method signature `ret name::(params)` into its three parts.
///
/// The return part may be absent (`"reply::(s)"` yields an empty return). Both the return and
/// the parameter part are validated as signatures.
pub fn signature_split(full: &str) -> Result<(String, String, String), SignatureParseError> {
    let sep = full
        .find("::")
        .ok_or_else(|| SignatureParseError::new(full, 0, "missing '::' separator"))?;
    let params = &full[sep + 2..];
    if !params.starts_with('(') {
        return Err(SignatureParseError::new(
            full,
            sep + 2,
            "parameters must be a tuple",
        ));
    }
    let params_sig = Signature::new(params)?;
    if params_sig.size() != 1 {
        return Err(SignatureParseError::new(
            full,
            sep + 2,
            "parameters must be a single tuple",
        ));
    }

    let head = &full[..sep];
    let (ret, name) = match head.rfind(' ') {
        Some(split) => (&head[..split], &head[split + 1..]),
        None => ("", head),
    };
    if name.is_empty() {
        return Err(SignatureParseError::new(full, sep, "missing method name"));
    }
    if !ret.is_empty() {
        Signature::new(ret)?;
    }
    Ok((ret.to_string(), name.to_string(), params.to_string()))
}
