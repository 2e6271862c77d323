/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! The signal/slot mechanism: untyped [`SignalBase`], subscriber configuration and the typed
//! wrapper.

mod signal_base;
mod typed_signal;

pub use signal_base::{DispatchMode, SignalBase, SignalSubscriber, SubscriberId};
pub use typed_signal::TypedSignal;
