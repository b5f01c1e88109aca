use super::*;

use std::any::Any;
use std::io;
use std::sync::Mutex;

/// Whole-block access to a backing store. `buf` is always exactly `BSIZE` bytes.
pub trait BlockDevice: Send + Sync + Any {
    fn read_block(&self, blockno: usize, buf: &mut [u8]) -> io::Result<()>;
    fn write_block(&self, blockno: usize, buf: &[u8]) -> io::Result<()>;
    /// capacity in blocks
    fn block_count(&self) -> usize;
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
    /// Flush and let go of the store. The device is not used afterwards.
    fn close(&self) -> io::Result<()> {
        self.flush()
    }
}

/// A block device living entirely in memory.
pub struct MemDisk(Mutex<Vec<u8>>);

impl MemDisk {
    pub fn new(blocks: usize) -> Self {
        Self(Mutex::new(vec![0u8; blocks * BSIZE]))
    }
}

impl BlockDevice for MemDisk {
    fn read_block(&self, blockno: usize, buf: &mut [u8]) -> io::Result<()> {
        let disk = lock(&self.0);
        let start = blockno * BSIZE;
        let src = disk
            .get(start..start + BSIZE)
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "block past end of disk"))?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write_block(&self, blockno: usize, buf: &[u8]) -> io::Result<()> {
        let mut disk = lock(&self.0);
        let start = blockno * BSIZE;
        let dst = disk
            .get_mut(start..start + BSIZE)
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "block past end of disk"))?;
        dst.copy_from_slice(buf);
        Ok(())
    }

    fn block_count(&self) -> usize {
        lock(&self.0).len() / BSIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write() {
        let disk = MemDisk::new(4);
        let block = vec![42u8; BSIZE];
        disk.write_block(3, &block).unwrap();
        let mut read = vec![0u8; BSIZE];
        disk.read_block(3, &mut read).unwrap();
        assert_eq!(block, read);
        assert_eq!(disk.block_count(), 4);
    }

    #[test]
    fn out_of_range() {
        let disk = MemDisk::new(2);
        let mut buf = vec![0u8; BSIZE];
        assert!(disk.read_block(2, &mut buf).is_err());
    }
}
