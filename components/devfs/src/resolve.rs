//! Typed resolvers
//!
//! Every resolver runs the same sequence:
//!
//! ```text
//! setup ──► resolve ──┬── not found ─────────────► (nothing held) ──► NotFound
//!                     ├── wrong capability ──────► release ─────────► CapabilityMismatch
//!                     └── expected capability ───► hand NodeRef to caller
//! ```
//!
//! [`resolve_typed`] implements it once; the named entry points pin the
//! expected capability. A family compiled out of the image gets a stub that
//! reports `Unsupported` without consulting the registry.

use alloc::string::ToString;
use alloc::sync::Arc;
use log::error;

#[cfg(feature = "mqueue")]
use crate::driver::DriverPayload;
use crate::driver::{Capability, MessageQueue};
use crate::error::{DevfsError, Result};
use crate::node::NodeRef;
use crate::registry::NodeRegistry;
use crate::search::SearchContext;

/// Resolve `path` to a node of capability `expected`
///
/// On success the caller owns one counted reference. On any error the
/// node's reference count is unchanged.
///
/// # Errors
/// - `Unsupported` if the `expected` family is not compiled in
/// - `NotFound` if no driver is registered at `path`, including paths that
///   are malformed or exceed the registry limits
/// - `CapabilityMismatch` if the driver at `path` is of another kind
pub fn resolve_typed<'r>(
    registry: &'r NodeRegistry,
    path: &str,
    expected: Capability,
) -> Result<NodeRef<'r>> {
    if !expected.is_enabled() {
        return Err(DevfsError::Unsupported { family: expected });
    }

    let mut search = SearchContext::setup(registry, path, false);
    search.resolve().map_err(|err| {
        error!("devfs: Failed to find {}: {}", path, err);
        lookup_failure(path, err)
    })?;
    finish(search, path, expected)
}

/// Fold a failed lookup into `NotFound`
///
/// A malformed or over-long path cannot name a registered node, so resolver
/// callers see it as absent. `RegistryFull` is kept: it reports a create that
/// had no room, not a missing node.
fn lookup_failure(path: &str, err: DevfsError) -> DevfsError {
    match err {
        DevfsError::RegistryFull { .. } => err,
        _ => DevfsError::NotFound {
            path: path.to_string(),
        },
    }
}

/// Check the tag of a resolved search and either transfer or release
fn finish<'r>(search: SearchContext<'r>, path: &str, expected: Capability) -> Result<NodeRef<'r>> {
    let not_found = || DevfsError::NotFound {
        path: path.to_string(),
    };

    let found = search.node().map(|node| node.capability()).ok_or_else(not_found)?;
    if found != expected {
        error!("devfs: {} is not a {} driver (found {})", path, expected, found);
        search.release();
        return Err(DevfsError::CapabilityMismatch {
            path: path.to_string(),
            expected,
            found,
        });
    }

    search.into_node().ok_or_else(not_found)
}

macro_rules! typed_resolver {
    ($(#[$meta:meta])* $name:ident, $feature:literal, $capability:expr) => {
        $(#[$meta])*
        #[cfg(feature = $feature)]
        pub fn $name<'r>(registry: &'r NodeRegistry, path: &str) -> Result<NodeRef<'r>> {
            resolve_typed(registry, path, $capability)
        }

        $(#[$meta])*
        #[cfg(not(feature = $feature))]
        pub fn $name<'r>(_registry: &'r NodeRegistry, _path: &str) -> Result<NodeRef<'r>> {
            Err(DevfsError::Unsupported {
                family: $capability,
            })
        }
    };
}

typed_resolver!(
    /// Locate the MTD driver registered at `path`
    ///
    /// # Errors
    /// `NotFound`, `CapabilityMismatch` (not an MTD driver), or `Unsupported`
    /// when the `mtd` feature is off
    find_mtd_driver,
    "mtd",
    Capability::Mtd
);

typed_resolver!(
    /// Locate the block driver registered at `path`
    find_block_driver,
    "block",
    Capability::Block
);

typed_resolver!(
    /// Locate the character driver registered at `path`
    find_char_driver,
    "char",
    Capability::Character
);

typed_resolver!(
    /// Locate an existing message queue at `path`
    find_mqueue,
    "mqueue",
    Capability::MessageQueue
);

typed_resolver!(
    /// Locate the socket node registered at `path`
    find_socket,
    "socket",
    Capability::Socket
);

/// Open the message queue at `path`, creating it with `create` if absent
///
/// Lookup and creation are atomic with respect to other openers: of two
/// racing callers exactly one runs `create`. It runs under the registry
/// lock and must not call back into the registry.
///
/// # Errors
/// - `CapabilityMismatch` if another kind of node occupies `path`
/// - `RegistryFull` when the registry has no room for the queue
/// - `NotFound` when `path` cannot name a node
/// - `Unsupported` when the `mqueue` feature is off
#[cfg(feature = "mqueue")]
pub fn open_mqueue<'r, F>(registry: &'r NodeRegistry, path: &str, create: F) -> Result<NodeRef<'r>>
where
    F: FnOnce() -> Arc<dyn MessageQueue>,
{
    let mut search = SearchContext::setup(registry, path, true);
    search
        .resolve_or_create(|| DriverPayload::MessageQueue(create()))
        .map_err(|err| {
            error!("devfs: Failed to open message queue {}: {}", path, err);
            lookup_failure(path, err)
        })?;
    finish(search, path, Capability::MessageQueue)
}

/// Open the message queue at `path`, creating it with `create` if absent
#[cfg(not(feature = "mqueue"))]
pub fn open_mqueue<'r, F>(_registry: &'r NodeRegistry, _path: &str, _create: F) -> Result<NodeRef<'r>>
where
    F: FnOnce() -> Arc<dyn MessageQueue>,
{
    Err(DevfsError::Unsupported {
        family: Capability::MessageQueue,
    })
}
