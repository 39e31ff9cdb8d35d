//! Error types for driver node registration and resolution

use alloc::string::String;
use thiserror::Error;

use crate::driver::Capability;

/// Errno values used by the status surface (positive; negated on return)
pub mod errno {
    /// No such file or directory
    pub const ENOENT: i32 = 2;
    /// No such device or address
    pub const ENXIO: i32 = 6;
    /// Block device required
    pub const ENOTBLK: i32 = 15;
    /// Device or resource busy
    pub const EBUSY: i32 = 16;
    /// File exists
    pub const EEXIST: i32 = 17;
    /// No such device
    pub const ENODEV: i32 = 19;
    /// Invalid argument
    pub const EINVAL: i32 = 22;
    /// No space left on device
    pub const ENOSPC: i32 = 28;
    /// File name too long
    pub const ENAMETOOLONG: i32 = 36;
    /// Socket operation on non-socket
    pub const ENOTSOCK: i32 = 88;
}

/// devfs error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DevfsError {
    #[error("No driver registered at {path}")]
    NotFound { path: String },

    #[error("{path} is not a {expected} driver (found {found})")]
    CapabilityMismatch {
        path: String,
        expected: Capability,
        found: Capability,
    },

    #[error("{family} drivers are not supported in this build")]
    Unsupported { family: Capability },

    #[error("Driver at {path} is busy ({refs} outstanding references)")]
    Busy { path: String, refs: usize },

    #[error("Driver already registered at {path}")]
    AlreadyExists { path: String },

    #[error("Invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("Path {path:?} exceeds {limit} bytes")]
    PathTooLong { path: String, limit: usize },

    #[error("Registry full ({capacity} nodes)")]
    RegistryFull { capacity: usize },
}

pub type Result<T> = core::result::Result<T, DevfsError>;

impl DevfsError {
    /// Negated errno reported through the status surface
    pub fn errno(&self) -> i32 {
        let code = match self {
            DevfsError::NotFound { .. } => errno::ENOENT,
            DevfsError::CapabilityMismatch { expected, .. } => match expected {
                Capability::Block | Capability::Mtd => errno::ENOTBLK,
                Capability::Socket => errno::ENOTSOCK,
                Capability::Character | Capability::MessageQueue => errno::ENXIO,
            },
            DevfsError::Unsupported { .. } => errno::ENODEV,
            DevfsError::Busy { .. } => errno::EBUSY,
            DevfsError::AlreadyExists { .. } => errno::EEXIST,
            DevfsError::InvalidPath { .. } => errno::EINVAL,
            DevfsError::PathTooLong { .. } => errno::ENAMETOOLONG,
            DevfsError::RegistryFull { .. } => errno::ENOSPC,
        };
        -code
    }
}
