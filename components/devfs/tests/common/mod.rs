//! Test drivers shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use kaal_devfs::{
    BlockDriver, BlockGeometry, CharDriver, DriverPayload, IoError, IoResult, MessageQueue,
    MtdDriver, MtdGeometry, NodeRegistry, RegistryConfig,
};

/// NOR flash stand-in: 16 erase blocks of 4KB, 256 byte pages
#[derive(Debug)]
pub struct FlashMtd {
    pub label: &'static str,
}

impl MtdDriver for FlashMtd {
    fn geometry(&self) -> MtdGeometry {
        MtdGeometry {
            block_size: 256,
            erase_size: 4096,
            neraseblocks: 16,
        }
    }

    fn erase(&self, start_block: usize, nblocks: usize) -> IoResult<usize> {
        if start_block + nblocks > 16 {
            return Err(IoError::OutOfRange);
        }
        Ok(nblocks)
    }

    fn bread(&self, _start_block: usize, buf: &mut [u8]) -> IoResult<usize> {
        buf.fill(0xff);
        Ok(buf.len() / 256)
    }

    fn bwrite(&self, _start_block: usize, buf: &[u8]) -> IoResult<usize> {
        Ok(buf.len() / 256)
    }
}

#[derive(Debug)]
pub struct RamDisk;

impl BlockDriver for RamDisk {
    fn geometry(&self) -> BlockGeometry {
        BlockGeometry {
            sector_size: 512,
            nsectors: 2048,
            writable: true,
        }
    }

    fn read(&self, _start_sector: u64, buf: &mut [u8]) -> IoResult<usize> {
        buf.fill(0);
        Ok(buf.len())
    }

    fn write(&self, _start_sector: u64, buf: &[u8]) -> IoResult<usize> {
        Ok(buf.len())
    }
}

#[derive(Debug)]
pub struct Console;

impl CharDriver for Console {
    fn read(&self, _buf: &mut [u8]) -> IoResult<usize> {
        Err(IoError::WouldBlock)
    }

    fn write(&self, buf: &[u8]) -> IoResult<usize> {
        Ok(buf.len())
    }
}

#[derive(Debug, Default)]
pub struct JobQueue {
    messages: Mutex<Vec<(Vec<u8>, u32)>>,
}

impl MessageQueue for JobQueue {
    fn max_msgs(&self) -> usize {
        16
    }

    fn max_msg_size(&self) -> usize {
        128
    }

    fn send(&self, msg: &[u8], priority: u32) -> IoResult<()> {
        let mut messages = self.messages.lock().map_err(|_| IoError::Device)?;
        if messages.len() >= self.max_msgs() {
            return Err(IoError::WouldBlock);
        }
        messages.push((msg.to_vec(), priority));
        Ok(())
    }

    fn receive(&self, buf: &mut [u8]) -> IoResult<(usize, u32)> {
        let mut messages = self.messages.lock().map_err(|_| IoError::Device)?;
        let index = messages
            .iter()
            .enumerate()
            .max_by_key(|(_, (_, priority))| *priority)
            .map(|(index, _)| index)
            .ok_or(IoError::WouldBlock)?;
        let (msg, priority) = messages.remove(index);
        let len = msg.len().min(buf.len());
        buf[..len].copy_from_slice(&msg[..len]);
        Ok((len, priority))
    }
}

pub fn flash(label: &'static str) -> DriverPayload {
    DriverPayload::Mtd(Arc::new(FlashMtd { label }))
}

pub fn ramdisk() -> DriverPayload {
    DriverPayload::Block(Arc::new(RamDisk))
}

pub fn console() -> DriverPayload {
    DriverPayload::Character(Arc::new(Console))
}

/// Queue factory that counts how often it ran
pub fn counting_queue(created: &AtomicUsize) -> impl FnOnce() -> Arc<dyn MessageQueue> + '_ {
    move || {
        created.fetch_add(1, Ordering::SeqCst);
        Arc::new(JobQueue::default())
    }
}

/// Registry populated the way a board bring-up would
pub fn boot_registry() -> NodeRegistry {
    let registry = NodeRegistry::new(RegistryConfig::default());
    registry.register("/dev/mtd0", flash("boot")).unwrap();
    registry.register("/dev/sda", ramdisk()).unwrap();
    registry.register("/dev/console", console()).unwrap();
    registry
}
