//! Registry nodes and counted node references

use alloc::sync::Arc;
use core::fmt;
use core::ops::Deref;
use static_assertions::{assert_impl_all, assert_not_impl_any};

use crate::driver::{Capability, DriverPayload};
use crate::path::CanonicalPath;
use crate::registry::NodeRegistry;

/// One registered driver
///
/// The path and payload are fixed at registration; the reference count is
/// kept by the owning [`NodeRegistry`].
#[derive(Debug)]
pub struct Node {
    path: CanonicalPath,
    payload: DriverPayload,
}

impl Node {
    pub(crate) fn new(path: CanonicalPath, payload: DriverPayload) -> Self {
        Self { path, payload }
    }

    /// Registration path
    pub fn path(&self) -> &CanonicalPath {
        &self.path
    }

    /// Capability tag (derived from the payload, never changes)
    pub fn capability(&self) -> Capability {
        self.payload.capability()
    }

    /// Driver state
    pub fn payload(&self) -> &DriverPayload {
        &self.payload
    }
}

/// One counted reference to a registered node
///
/// Produced only by a successful lookup, which incremented the node's
/// reference count. Dropping it (or handing it to [`NodeRegistry::release`])
/// decrements the count exactly once. It cannot be cloned, so a reference
/// cannot be released twice.
#[must_use = "dropping a NodeRef releases the reference immediately"]
pub struct NodeRef<'r> {
    registry: &'r NodeRegistry,
    node: Arc<Node>,
}

assert_impl_all!(NodeRef<'static>: Send, Sync);
assert_not_impl_any!(NodeRef<'static>: Clone, Copy);

impl<'r> NodeRef<'r> {
    /// Caller must have already counted this reference in `registry`
    pub(crate) fn new(registry: &'r NodeRegistry, node: Arc<Node>) -> Self {
        Self { registry, node }
    }

    /// Registry this reference will be released to
    pub fn registry(&self) -> &'r NodeRegistry {
        self.registry
    }

    /// Whether both references point at the same registered node
    pub fn ptr_eq(&self, other: &NodeRef<'_>) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

impl Deref for NodeRef<'_> {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.node
    }
}

impl Drop for NodeRef<'_> {
    fn drop(&mut self) {
        self.registry.release_node(&self.node);
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("path", &self.node.path)
            .field("capability", &self.node.capability())
            .finish()
    }
}
