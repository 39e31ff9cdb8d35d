//! Stand-in drivers for manifest entries
//!
//! The probe exercises path resolution only; the stubs answer geometry
//! queries and accept I/O without touching hardware.

use kaal_devfs::{
    BlockDriver, BlockGeometry, Capability, CharDriver, DriverPayload, IoError, IoResult,
    MessageQueue, MtdDriver, MtdGeometry, SocketDriver,
};
use std::sync::Arc;

const DEFAULT_BLOCKS: usize = 64;
const AF_LOCAL: u16 = 1;

#[derive(Debug)]
struct StubBlock {
    nsectors: u64,
}

impl BlockDriver for StubBlock {
    fn geometry(&self) -> BlockGeometry {
        BlockGeometry {
            sector_size: 512,
            nsectors: self.nsectors,
            writable: false,
        }
    }

    fn read(&self, start_sector: u64, buf: &mut [u8]) -> IoResult<usize> {
        if start_sector >= self.nsectors {
            return Err(IoError::OutOfRange);
        }
        buf.fill(0);
        Ok(buf.len())
    }

    fn write(&self, _start_sector: u64, _buf: &[u8]) -> IoResult<usize> {
        Err(IoError::NotSupported)
    }
}

#[derive(Debug)]
struct StubChar;

impl CharDriver for StubChar {
    fn read(&self, _buf: &mut [u8]) -> IoResult<usize> {
        Ok(0)
    }

    fn write(&self, buf: &[u8]) -> IoResult<usize> {
        Ok(buf.len())
    }
}

#[derive(Debug)]
struct StubMtd {
    neraseblocks: usize,
}

impl MtdDriver for StubMtd {
    fn geometry(&self) -> MtdGeometry {
        MtdGeometry {
            block_size: 512,
            erase_size: 4096,
            neraseblocks: self.neraseblocks,
        }
    }

    fn erase(&self, start_block: usize, nblocks: usize) -> IoResult<usize> {
        if start_block + nblocks > self.neraseblocks {
            return Err(IoError::OutOfRange);
        }
        Ok(nblocks)
    }

    fn bread(&self, _start_block: usize, buf: &mut [u8]) -> IoResult<usize> {
        buf.fill(0xff);
        Ok(buf.len() / 512)
    }

    fn bwrite(&self, _start_block: usize, _buf: &[u8]) -> IoResult<usize> {
        Err(IoError::NotSupported)
    }
}

#[derive(Debug)]
struct StubQueue;

impl MessageQueue for StubQueue {
    fn max_msgs(&self) -> usize {
        8
    }

    fn max_msg_size(&self) -> usize {
        64
    }

    fn send(&self, _msg: &[u8], _priority: u32) -> IoResult<()> {
        Err(IoError::WouldBlock)
    }

    fn receive(&self, _buf: &mut [u8]) -> IoResult<(usize, u32)> {
        Err(IoError::WouldBlock)
    }
}

#[derive(Debug)]
struct StubSocket;

impl SocketDriver for StubSocket {
    fn domain(&self) -> u16 {
        AF_LOCAL
    }
}

/// Stub payload of the given capability
pub fn payload(capability: Capability, blocks: Option<usize>) -> DriverPayload {
    let blocks = blocks.unwrap_or(DEFAULT_BLOCKS);
    match capability {
        Capability::Block => DriverPayload::Block(Arc::new(StubBlock {
            nsectors: blocks as u64,
        })),
        Capability::Character => DriverPayload::Character(Arc::new(StubChar)),
        Capability::Mtd => DriverPayload::Mtd(Arc::new(StubMtd {
            neraseblocks: blocks,
        })),
        Capability::MessageQueue => DriverPayload::MessageQueue(Arc::new(StubQueue)),
        Capability::Socket => DriverPayload::Socket(Arc::new(StubSocket)),
    }
}

/// One-line description of the driver behind `payload`
pub fn describe(payload: &DriverPayload) -> String {
    match payload {
        DriverPayload::Block(dev) => {
            let geo = dev.geometry();
            format!("{} sectors of {} bytes", geo.nsectors, geo.sector_size)
        }
        DriverPayload::Mtd(dev) => {
            let geo = dev.geometry();
            format!("{} erase blocks of {} bytes", geo.neraseblocks, geo.erase_size)
        }
        DriverPayload::MessageQueue(queue) => {
            format!("{} messages of {} bytes", queue.max_msgs(), queue.max_msg_size())
        }
        DriverPayload::Socket(sock) => format!("domain {}", sock.domain()),
        DriverPayload::Character(_) => "character stream".to_string(),
    }
}
