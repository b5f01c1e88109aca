use super::*;
use block_device::BlockDevice;
use buf::Buffer;
use error::{FsError, Pool, Result};

use log::{debug, warn};

/// A single-block allocation bitmap. Bit `i` set means slot `i` is in use.
///
/// The bitmap is not internally synchronized; the owner keeps it behind a mutex
/// so two `alloc` calls never hand out the same slot.
pub struct BitMap {
    blockno: usize,
    capacity: usize,
    pool: Pool,
}

impl BitMap {
    pub fn new(blockno: usize, capacity: usize, pool: Pool) -> Self {
        assert!(capacity <= BPB);
        Self {
            blockno,
            capacity,
            pool,
        }
    }

    /// Clear every bit.
    pub fn reset(&self, dev: &dyn BlockDevice) -> Result<()> {
        Buffer::zeroed(self.blockno).bwrite(dev)
    }

    /// Set the first clear bit, scanning from 0, and return its index.
    pub fn alloc(&self, dev: &dyn BlockDevice) -> Result<usize> {
        let mut bp = Buffer::bread(dev, self.blockno)?;
        for bno in 0..self.capacity {
            let byte = bno / 8;
            let mask = 1u8 << (bno % 8);
            if bp.data[byte] & mask == 0 {
                bp.data[byte] |= mask;
                bp.bwrite(dev)?;
                debug!("alloc {} #{}", self.pool, bno);
                return Ok(bno);
            }
        }
        Err(FsError::Exhausted(self.pool))
    }

    /// Mark `bno` used without searching. Only format needs this.
    pub fn mark(&self, dev: &dyn BlockDevice, bno: usize) -> Result<()> {
        self.check(bno)?;
        let mut bp = Buffer::bread(dev, self.blockno)?;
        bp.data[bno / 8] |= 1 << (bno % 8);
        bp.bwrite(dev)
    }

    pub fn dealloc(&self, dev: &dyn BlockDevice, bno: usize) -> Result<()> {
        self.check(bno)?;
        let mut bp = Buffer::bread(dev, self.blockno)?;
        let mask = 1u8 << (bno % 8);
        if bp.data[bno / 8] & mask == 0 {
            warn!("dealloc {} #{}: already free", self.pool, bno);
            return Ok(());
        }
        bp.data[bno / 8] &= !mask;
        bp.bwrite(dev)?;
        debug!("dealloc {} #{}", self.pool, bno);
        Ok(())
    }

    #[cfg(test)]
    fn is_set(&self, dev: &dyn BlockDevice, bno: usize) -> Result<bool> {
        self.check(bno)?;
        let bp = Buffer::bread(dev, self.blockno)?;
        Ok(bp.data[bno / 8] & (1 << (bno % 8)) != 0)
    }

    /// number of set bits
    pub fn used(&self, dev: &dyn BlockDevice) -> Result<usize> {
        let bp = Buffer::bread(dev, self.blockno)?;
        Ok((0..self.capacity)
            .filter(|&bno| bp.data[bno / 8] & (1 << (bno % 8)) != 0)
            .count())
    }

    fn check(&self, bno: usize) -> Result<()> {
        if bno >= self.capacity {
            return Err(FsError::InvalidIndex {
                index: bno,
                limit: self.capacity,
            });
        }
        Ok(())
    }
}
