use super::*;
use block_device::BlockDevice;
use error::{FsError, Result};

use log::trace;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// One block's worth of bytes, read from or headed for `blockno`.
///
/// Nothing is cached between calls: every `bread` goes to the device.
pub struct Buffer {
    blockno: usize,
    pub data: Vec<u8>,
}

impl Buffer {
    pub fn zeroed(blockno: usize) -> Self {
        Self {
            blockno,
            data: vec![0u8; BSIZE],
        }
    }

    /// block(disk) -> block(mem)
    pub fn bread(dev: &dyn BlockDevice, blockno: usize) -> Result<Self> {
        check_blockno(dev, blockno)?;
        let mut buf = Self::zeroed(blockno);
        dev.read_block(blockno, &mut buf.data)?;
        trace!("bread {}", blockno);
        Ok(buf)
    }

    /// block(mem) -> block(disk)
    pub fn bwrite(&self, dev: &dyn BlockDevice) -> Result<()> {
        check_blockno(dev, self.blockno)?;
        dev.write_block(self.blockno, &self.data)?;
        trace!("bwrite {}", self.blockno);
        Ok(())
    }

    fn slot(&self, offset: usize, size: usize) -> Result<std::ops::Range<usize>> {
        if offset + size > BSIZE {
            return Err(FsError::InvalidIndex {
                index: offset + size,
                limit: BSIZE,
            });
        }
        Ok(offset..offset + size)
    }

    /// Decode a `T` stored in the `size` bytes at `offset`.
    pub fn decode<T: DeserializeOwned>(&self, offset: usize, size: usize) -> Result<T> {
        let range = self.slot(offset, size)?;
        Ok(bincode::deserialize(&self.data[range])?)
    }

    /// Encode `value` into the `size` bytes at `offset`; unused tail bytes are zeroed.
    pub fn encode<T: Serialize>(&mut self, offset: usize, size: usize, value: &T) -> Result<()> {
        let range = self.slot(offset, size)?;
        let slot = &mut self.data[range];
        slot.fill(0);
        bincode::serialize_into(slot, value)?;
        Ok(())
    }
}

fn check_blockno(dev: &dyn BlockDevice, blockno: usize) -> Result<()> {
    let limit = dev.block_count();
    if blockno >= limit {
        return Err(FsError::InvalidIndex {
            index: blockno,
            limit,
        });
    }
    Ok(())
}
