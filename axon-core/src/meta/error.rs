/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::error::Error;
use std::fmt;

/// Failure of a single value conversion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConvertError {
    from: String,
    to: String,
}

impl ConvertError {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        ConvertError {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot convert {} to {}", self.from, self.to)
    }
}

impl Error for ConvertError {}

/// Error capable of representing failed meta calls.
///
/// Asynchronous failures travel on the error channel of the future returned by `meta_call`; the
/// `Display` text of this type is what ends up there. The wire-visible messages
/// (`"No such method"`, `"Signal getter returned NULL"`) are stable: remote peers match on them.
#[derive(Clone, Debug, PartialEq)]
pub enum CallError {
    /// The method id (or name + argument signature) resolved to nothing.
    NoSuchMethod,
    /// The signal id is not part of the object's meta-object.
    NoSuchSignal(u32),
    /// A statically-described object's signal getter produced no signal for a registered id.
    SignalGetterNull,
    /// Disconnect of a link id that is not (or no longer) registered.
    NoSuchLink,
    /// Argument list length does not match the method's parameter list.
    ArgumentCount { expected: usize, actual: usize },
    /// A single argument could not be converted to the parameter type.
    BadArgument { index: usize, inner: ConvertError },
    /// The callable itself failed; carries its error text verbatim.
    Failed(String),
}

impl CallError {
    /// Shorthand for [`CallError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        CallError::Failed(message.into())
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::NoSuchMethod => write!(f, "No such method"),
            CallError::NoSuchSignal(id) => write!(f, "No such signal {id}"),
            CallError::SignalGetterNull => write!(f, "Signal getter returned NULL"),
            CallError::NoSuchLink => write!(f, "No such link"),
            CallError::ArgumentCount { expected, actual } => {
                write!(f, "expected {expected} arguments, got {actual}")
            }
            CallError::BadArgument { index, inner } => {
                write!(f, "argument {index}: {inner}")
            }
            CallError::Failed(message) => write!(f, "{message}"),
        }
    }
}

impl Error for CallError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CallError::BadArgument { inner, .. } => Some(inner),
            _ => None,
        }
    }
}

impl From<ConvertError> for CallError {
    fn from(inner: ConvertError) -> Self {
        CallError::BadArgument { index: 0, inner }
    }
}
