//! Scoped lookup protocol
//!
//! A [`SearchContext`] binds one registry lookup to exactly one release.
//! Whatever reference the search acquires is released when the context is
//! dropped, unless it was handed out with [`SearchContext::into_node`]. An
//! early `return` or `?` therefore cannot leak a reference, and the success
//! path does not release what it is handing to the caller.

use alloc::string::String;
use log::debug;

use crate::driver::DriverPayload;
use crate::error::Result;
use crate::node::{Node, NodeRef};
use crate::registry::NodeRegistry;

/// One lookup in flight
#[derive(Debug)]
pub struct SearchContext<'r> {
    registry: &'r NodeRegistry,
    target_path: String,
    allow_create: bool,
    resolved: Option<NodeRef<'r>>,
    attempted: bool,
}

impl<'r> SearchContext<'r> {
    /// Prepare a lookup of `path`; the registry is not touched yet
    ///
    /// `allow_create` permits [`resolve_or_create`](Self::resolve_or_create)
    /// to register a node when none exists.
    ///
    /// # Panics
    /// In debug builds, if `path` is empty. Callers must always name a path.
    pub fn setup(registry: &'r NodeRegistry, path: &str, allow_create: bool) -> Self {
        debug_assert!(!path.is_empty(), "devfs: search set up without a path");

        Self {
            registry,
            target_path: String::from(path),
            allow_create,
            resolved: None,
            attempted: false,
        }
    }

    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    pub fn allow_create(&self) -> bool {
        self.allow_create
    }

    /// Look the path up, holding the acquired reference in this context
    ///
    /// # Errors
    /// `NotFound` if nothing is registered; path errors from the resolver
    pub fn resolve(&mut self) -> Result<&Node> {
        self.begin();
        let path = self.registry.canonicalize(&self.target_path)?;
        let node = self.registry.lookup_canonical(&path)?;
        let node: &Node = self.resolved.insert(node);
        Ok(node)
    }

    /// Like [`resolve`](Self::resolve), but when `allow_create` is set and
    /// nothing is registered, register `create()` first
    ///
    /// The check and the insert happen under one registry lock.
    pub fn resolve_or_create<F>(&mut self, create: F) -> Result<&Node>
    where
        F: FnOnce() -> DriverPayload,
    {
        if !self.allow_create {
            return self.resolve();
        }

        self.begin();
        let path = self.registry.canonicalize(&self.target_path)?;
        let node = self.registry.lookup_or_insert_with(&path, create)?;
        let node: &Node = self.resolved.insert(node);
        Ok(node)
    }

    fn begin(&mut self) {
        debug_assert!(
            !self.attempted,
            "devfs: search for {} resolved twice",
            self.target_path
        );
        self.attempted = true;
        // A repeated resolve must not strand the first reference.
        self.resolved = None;
    }

    /// Whether this context currently holds an acquired reference
    pub fn is_holding(&self) -> bool {
        self.resolved.is_some()
    }

    /// The resolved node, if the lookup succeeded
    pub fn node(&self) -> Option<&Node> {
        self.resolved.as_deref()
    }

    /// Hand the acquired reference to the caller
    ///
    /// Ends the search without releasing; the caller now owns the reference.
    pub fn into_node(mut self) -> Option<NodeRef<'r>> {
        self.resolved.take()
    }

    /// End the search, releasing any reference it acquired
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for SearchContext<'_> {
    fn drop(&mut self) {
        if let Some(node) = self.resolved.take() {
            debug!("devfs: search for {} releasing {}", self.target_path, node.path());
            drop(node);
        }
    }
}
