//! Driver capabilities and payloads
//!
//! A node's payload is one of a closed set of variants, one per capability.
//! The capability tag is derived from the variant, so a node can never carry
//! a tag that disagrees with its payload, and checking "is this an MTD
//! driver" is a tag comparison rather than a downcast.
//!
//! The driver traits are the interfaces concrete drivers implement; devfs
//! never calls them itself, it only hands them out to resolvers' callers.

use alloc::sync::Arc;
use bitflags::bitflags;
use core::fmt::{self, Debug};
use thiserror::Error;

/// Kind of driver registered at a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// Block device (sector addressed)
    Block,
    /// Character device (byte stream)
    Character,
    /// Memory technology device (erase/program/read flash)
    Mtd,
    /// Named message queue
    MessageQueue,
    /// Socket (local socket node)
    Socket,
}

impl Capability {
    /// All capability kinds
    pub const ALL: [Capability; 5] = [
        Capability::Block,
        Capability::Character,
        Capability::Mtd,
        Capability::MessageQueue,
        Capability::Socket,
    ];

    /// Short name used in manifests and listings
    pub fn name(self) -> &'static str {
        match self {
            Capability::Block => "block",
            Capability::Character => "char",
            Capability::Mtd => "mtd",
            Capability::MessageQueue => "mqueue",
            Capability::Socket => "socket",
        }
    }

    /// Parse a short name produced by [`Capability::name`]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cap| cap.name() == name)
    }

    /// Whether this capability family was compiled into the image
    pub fn is_enabled(self) -> bool {
        Families::ENABLED.contains(Families::of(self))
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Capability::Block => "block",
            Capability::Character => "character",
            Capability::Mtd => "MTD",
            Capability::MessageQueue => "message queue",
            Capability::Socket => "socket",
        };
        f.write_str(label)
    }
}

bitflags! {
    /// Set of capability families
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Families: u32 {
        const BLOCK = 1 << 0;
        const CHAR = 1 << 1;
        const MTD = 1 << 2;
        const MQUEUE = 1 << 3;
        const SOCKET = 1 << 4;
    }
}

impl Families {
    /// Families compiled into this build (Cargo features)
    pub const ENABLED: Families = Families::from_bits_retain(
        (if cfg!(feature = "block") { Self::BLOCK.bits() } else { 0 })
            | (if cfg!(feature = "char") { Self::CHAR.bits() } else { 0 })
            | (if cfg!(feature = "mtd") { Self::MTD.bits() } else { 0 })
            | (if cfg!(feature = "mqueue") { Self::MQUEUE.bits() } else { 0 })
            | (if cfg!(feature = "socket") { Self::SOCKET.bits() } else { 0 }),
    );

    /// Family flag for a capability
    pub const fn of(capability: Capability) -> Families {
        match capability {
            Capability::Block => Self::BLOCK,
            Capability::Character => Self::CHAR,
            Capability::Mtd => Self::MTD,
            Capability::MessageQueue => Self::MQUEUE,
            Capability::Socket => Self::SOCKET,
        }
    }
}

/// Errors reported by driver operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IoError {
    #[error("Request out of device range")]
    OutOfRange,

    #[error("Operation not supported by driver")]
    NotSupported,

    #[error("Operation would block")]
    WouldBlock,

    #[error("Device I/O failure")]
    Device,
}

pub type IoResult<T> = core::result::Result<T, IoError>;

/// Block device geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGeometry {
    /// Bytes per sector
    pub sector_size: usize,
    /// Number of sectors
    pub nsectors: u64,
    /// Whether writes are accepted
    pub writable: bool,
}

/// Block driver interface
pub trait BlockDriver: Send + Sync + Debug {
    fn geometry(&self) -> BlockGeometry;
    fn read(&self, start_sector: u64, buf: &mut [u8]) -> IoResult<usize>;
    fn write(&self, start_sector: u64, buf: &[u8]) -> IoResult<usize>;
}

/// Character driver interface
pub trait CharDriver: Send + Sync + Debug {
    fn read(&self, buf: &mut [u8]) -> IoResult<usize>;
    fn write(&self, buf: &[u8]) -> IoResult<usize>;
}

/// MTD geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MtdGeometry {
    /// Size of one read/write block in bytes
    pub block_size: usize,
    /// Size of one erase block in bytes
    pub erase_size: usize,
    /// Number of erase blocks
    pub neraseblocks: usize,
}

/// Memory technology device interface
pub trait MtdDriver: Send + Sync + Debug {
    fn geometry(&self) -> MtdGeometry;

    /// Erase `nblocks` erase blocks starting at `start_block`
    fn erase(&self, start_block: usize, nblocks: usize) -> IoResult<usize>;

    /// Read whole blocks
    fn bread(&self, start_block: usize, buf: &mut [u8]) -> IoResult<usize>;

    /// Program whole blocks
    fn bwrite(&self, start_block: usize, buf: &[u8]) -> IoResult<usize>;

    /// Byte-granular read, for parts that support it
    fn read(&self, _offset: usize, _buf: &mut [u8]) -> IoResult<usize> {
        Err(IoError::NotSupported)
    }
}

/// Message queue interface
pub trait MessageQueue: Send + Sync + Debug {
    fn max_msgs(&self) -> usize;
    fn max_msg_size(&self) -> usize;
    fn send(&self, msg: &[u8], priority: u32) -> IoResult<()>;

    /// Receive the highest priority message, returning (length, priority)
    fn receive(&self, buf: &mut [u8]) -> IoResult<(usize, u32)>;
}

/// Local socket node interface
pub trait SocketDriver: Send + Sync + Debug {
    /// Address family served by the socket
    fn domain(&self) -> u16;
}

/// Capability-specific driver state held by a node
#[derive(Debug, Clone)]
pub enum DriverPayload {
    Block(Arc<dyn BlockDriver>),
    Character(Arc<dyn CharDriver>),
    Mtd(Arc<dyn MtdDriver>),
    MessageQueue(Arc<dyn MessageQueue>),
    Socket(Arc<dyn SocketDriver>),
}

impl DriverPayload {
    /// Capability tag of this payload
    pub fn capability(&self) -> Capability {
        match self {
            DriverPayload::Block(_) => Capability::Block,
            DriverPayload::Character(_) => Capability::Character,
            DriverPayload::Mtd(_) => Capability::Mtd,
            DriverPayload::MessageQueue(_) => Capability::MessageQueue,
            DriverPayload::Socket(_) => Capability::Socket,
        }
    }

    pub fn as_block(&self) -> Option<&Arc<dyn BlockDriver>> {
        match self {
            DriverPayload::Block(drv) => Some(drv),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<&Arc<dyn CharDriver>> {
        match self {
            DriverPayload::Character(drv) => Some(drv),
            _ => None,
        }
    }

    pub fn as_mtd(&self) -> Option<&Arc<dyn MtdDriver>> {
        match self {
            DriverPayload::Mtd(drv) => Some(drv),
            _ => None,
        }
    }

    pub fn as_mqueue(&self) -> Option<&Arc<dyn MessageQueue>> {
        match self {
            DriverPayload::MessageQueue(mq) => Some(mq),
            _ => None,
        }
    }

    pub fn as_socket(&self) -> Option<&Arc<dyn SocketDriver>> {
        match self {
            DriverPayload::Socket(sock) => Some(sock),
            _ => None,
        }
    }

    /// Whether both payloads refer to the same driver instance
    pub fn same_driver(&self, other: &DriverPayload) -> bool {
        self.data_ptr() == other.data_ptr()
    }

    fn data_ptr(&self) -> *const () {
        match self {
            DriverPayload::Block(drv) => Arc::as_ptr(drv) as *const (),
            DriverPayload::Character(drv) => Arc::as_ptr(drv) as *const (),
            DriverPayload::Mtd(drv) => Arc::as_ptr(drv) as *const (),
            DriverPayload::MessageQueue(mq) => Arc::as_ptr(mq) as *const (),
            DriverPayload::Socket(sock) => Arc::as_ptr(sock) as *const (),
        }
    }
}
