/*
 * Copyright (c) axon contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::sync::OnceLock;

use crate::task::EventLoop;

/// Owner of the two well-known event loops.
///
/// The *network* loop is meant for I/O (transport framing, socket readiness), the *object* loop
/// for method dispatch; keeping them distinct prevents a slow method from starving the wire.
/// Collaborators receive a `&Runtime` rather than reaching for globals;
/// [`Runtime::global()`] is a thin process-wide convenience over an explicit handle.
///
/// Dropping a runtime stops both loops and joins their workers; tasks still queued resolve
/// with an error.
pub struct Runtime {
    network: EventLoop,
    object: EventLoop,
}

impl Runtime {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    /// The well-known I/O loop.
    pub fn network_loop(&self) -> &EventLoop {
        &self.network
    }

    /// The well-known dispatch loop.
    pub fn object_loop(&self) -> &EventLoop {
        &self.object
    }

    /// Process-wide default runtime, created on first use and never stopped.
    pub fn global() -> &'static Runtime {
        static GLOBAL: OnceLock<Runtime> = OnceLock::new();
        GLOBAL.get_or_init(Runtime::new)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.network.stop();
        self.object.stop();
    }
}

/// Configures the worker thread names of a [`Runtime`].
pub struct RuntimeBuilder {
    network_name: String,
    object_name: String,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        RuntimeBuilder {
            network_name: "axon-net".to_string(),
            object_name: "axon-obj".to_string(),
        }
    }
}

impl RuntimeBuilder {
    pub fn network_name(mut self, name: impl Into<String>) -> Self {
        self.network_name = name.into();
        self
    }

    pub fn object_name(mut self, name: impl Into<String>) -> Self {
        self.object_name = name.into();
        self
    }

    pub fn build(self) -> Runtime {
        Runtime {
            network: EventLoop::new(self.network_name),
            object: EventLoop::new(self.object_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loops_are_distinct() {
        let runtime = Runtime::new();
        let (tx, rx) = std::sync::mpsc::channel();

        let object_probe = runtime.object_loop().clone();
        runtime.network_loop().post(move || {
            // From inside the network loop, the object loop is foreign.
            tx.send(object_probe.is_in_loop_thread()).unwrap();
        });
        assert!(!rx.recv().unwrap());
    }

    #[test]
    fn builder_names_threads() {
        let runtime = Runtime::builder()
            .network_name("my-net")
            .object_name("my-obj")
            .build();
        assert_eq!(runtime.network_loop().name(), "my-net");
        assert_eq!(runtime.object_loop().name(), "my-obj");
    }
}
