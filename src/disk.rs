//! Block device backed by an image file on the host.

use super::*;
use block_device::BlockDevice;

use log::{debug, info};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

pub struct FileDisk {
    file: Mutex<File>,
    blocks: usize,
}

impl FileDisk {
    /// Create (or truncate) the image at `path` with room for `blocks` blocks.
    pub fn init<P: AsRef<Path>>(path: P, blocks: usize) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        file.set_len((blocks * BSIZE) as u64)?;
        info!("created {} ({} blocks)", path.as_ref().display(), blocks);
        Ok(Self {
            file: Mutex::new(file),
            blocks,
        })
    }

    /// Open an existing image. Fails with `NotFound` when there is none.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;
        let blocks = (file.metadata()?.len() as usize) / BSIZE;
        debug!("opened {} ({} blocks)", path.as_ref().display(), blocks);
        Ok(Self {
            file: Mutex::new(file),
            blocks,
        })
    }
}

impl BlockDevice for FileDisk {
    fn read_block(&self, blockno: usize, buf: &mut [u8]) -> io::Result<()> {
        let mut file = lock(&self.file);
        file.seek(SeekFrom::Start((blockno * BSIZE) as u64))?;
        file.read_exact(&mut buf[..BSIZE])
    }

    fn write_block(&self, blockno: usize, buf: &[u8]) -> io::Result<()> {
        let mut file = lock(&self.file);
        file.seek(SeekFrom::Start((blockno * BSIZE) as u64))?;
        file.write_all(&buf[..BSIZE])
    }

    fn block_count(&self) -> usize {
        self.blocks
    }

    fn flush(&self) -> io::Result<()> {
        lock(&self.file).sync_all()
    }

    fn close(&self) -> io::Result<()> {
        self.flush()?;
        debug!("closed image ({} blocks)", self.blocks);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(name: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("tfs-disk-{}-{}.img", name, std::process::id()));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn open_missing_is_not_found() {
        let path = image("missing");
        let err = FileDisk::open(&path).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn persists_across_reopen() {
        let path = image("reopen");
        let disk = FileDisk::init(&path, 8).unwrap();
        disk.write_block(5, &vec![0x5au8; BSIZE]).unwrap();
        disk.close().unwrap();

        let disk = FileDisk::open(&path).unwrap();
        assert_eq!(disk.block_count(), 8);
        let mut buf = vec![0u8; BSIZE];
        disk.read_block(5, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0x5a));
        disk.read_block(4, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
        std::fs::remove_file(&path).unwrap();
    }
}
