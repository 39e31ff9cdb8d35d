//! Device File System (devfs) - Driver node registry
//!
//! # Purpose
//! Resolves textual device paths (`/dev/mtd0`, `/dev/sda`, ...) to typed
//! driver objects and mediates concurrent access to them. Every registered
//! driver is a [`Node`] carrying a [`Capability`] tag, an opaque driver
//! payload and a reference count.
//!
//! # Integration Points
//! - Depends on: driver installation code (registers nodes during boot)
//! - Provides to: VFS mount code, POSIX layer, message queue and socket layers
//! - Capabilities required: none (pure bookkeeping, no kernel objects)
//!
//! # Architecture
//! ```text
//! caller ──► find_mtd_driver(path)
//!              │
//!              ▼
//!          SearchContext::setup ──► resolve ──► NodeRegistry::lookup (refs += 1)
//!              │
//!              ├── tag matches    ──► NodeRef handed to caller (no release)
//!              ├── tag mismatches ──► guard drops NodeRef (refs -= 1) ──► CapabilityMismatch
//!              └── not registered ──► nothing to drop ──► NotFound
//! ```
//!
//! A successful resolution hands the caller a [`NodeRef`]; dropping it (or
//! passing it to [`NodeRegistry::release`]) gives the reference back. Failed
//! resolutions never leave a reference behind.
//!
//! # Testing Strategy
//! - Unit tests: path canonicalisation, tree bookkeeping, guard release paths
//! - Integration tests: end-to-end resolver scenarios, concurrent lookups
//! - Benchmarks: contended lookup/release (criterion)

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

extern crate alloc;

mod driver;
mod error;
mod node;
mod path;
mod registry;
mod resolve;
mod search;
pub mod status;

pub use driver::{
    BlockDriver, BlockGeometry, Capability, CharDriver, DriverPayload, Families, IoError,
    IoResult, MessageQueue, MtdDriver, MtdGeometry, SocketDriver,
};
pub use error::{errno, DevfsError, Result};
pub use node::{Node, NodeRef};
pub use path::{AbsolutePathResolver, CanonicalPath, PathResolver};
pub use registry::{
    global, init_global, DirEntry, NodeRegistry, RegistryConfig, MAX_NODES, NAME_MAX, PATH_MAX,
};
pub use resolve::{
    find_block_driver, find_char_driver, find_mqueue, find_mtd_driver, find_socket, open_mqueue,
    resolve_typed,
};
pub use search::SearchContext;
