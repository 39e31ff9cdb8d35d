//! Status-code surface
//!
//! Syscall and POSIX shims report results as `0` or a negated errno. These
//! wrappers run the typed resolvers and flatten the outcome into
//! `(status, reference)`; the reference is present exactly when the status
//! is [`OK`].

use crate::error::Result;
use crate::node::NodeRef;
use crate::registry::NodeRegistry;
use crate::resolve;

/// Success status
pub const OK: i32 = 0;

/// Flatten a result into `(status, value)`
pub fn to_status<T>(result: Result<T>) -> (i32, Option<T>) {
    match result {
        Ok(value) => (OK, Some(value)),
        Err(err) => (err.errno(), None),
    }
}

macro_rules! status_resolver {
    ($(#[$meta:meta])* $name:ident => $typed:path) => {
        $(#[$meta])*
        pub fn $name<'r>(registry: &'r NodeRegistry, pathname: &str) -> (i32, Option<NodeRef<'r>>) {
            to_status($typed(registry, pathname))
        }
    };
}

status_resolver!(
    /// Locate the MTD driver at `pathname`
    ///
    /// Returns `0` with the reference, `-ENOENT` if nothing is registered,
    /// `-ENOTBLK` if the node is not an MTD driver, `-ENODEV` if MTD support
    /// is compiled out.
    resolve_mtd_driver => resolve::find_mtd_driver
);

status_resolver!(
    /// Locate the block driver at `pathname`
    resolve_block_driver => resolve::find_block_driver
);

status_resolver!(
    /// Locate the character driver at `pathname`
    resolve_char_driver => resolve::find_char_driver
);

status_resolver!(
    /// Locate the message queue at `pathname`
    resolve_mqueue => resolve::find_mqueue
);

status_resolver!(
    /// Locate the socket node at `pathname`
    resolve_socket => resolve::find_socket
);
