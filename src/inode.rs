use super::*;
use block_device::BlockDevice;
use buf::Buffer;
use error::{FsError, Result};

use libc::{getgid, getuid};
use log::trace;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FileKind {
    #[default]
    Directory,
    File,
}

impl From<FileKind> for fuser::FileType {
    fn from(kind: FileKind) -> Self {
        match kind {
            FileKind::File => fuser::FileType::RegularFile,
            FileKind::Directory => fuser::FileType::Directory,
        }
    }
}

/// Seconds since the epoch.
pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Stat {
    pub uid: u32,
    pub gid: u32,
    /// type and permission bits, as in `st_mode`
    pub mode: u32,
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
}

/// Inode on disk.
///
/// Encoded with bincode's fixed-int little-endian layout into an
/// `INODE_SIZE` slot; the record itself takes 121 bytes:
///
/// | offset | size | field   |
/// |--------|------|---------|
/// | 0      | 4    | ino     |
/// | 4      | 1    | valid   |
/// | 5      | 4    | kind    |
/// | 9      | 4    | nlink   |
/// | 13     | 8    | size    |
/// | 21     | 64   | addrs   |
/// | 85     | 36   | stat    |
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DInode {
    pub ino: u32,
    pub valid: bool,
    pub kind: FileKind,
    /// Number of links to inode in file system
    pub nlink: u32,
    /// Size of file (bytes)
    pub size: u64,
    /// Data block numbers, relative to the data region. `NULL_PTR` when unused.
    pub addrs: [u32; NDIRECT],
    pub stat: Stat,
}

impl DInode {
    /// A cleared record, as found in a never-used slot.
    pub fn empty(ino: u32) -> Self {
        Self {
            ino,
            valid: false,
            kind: FileKind::default(),
            nlink: 0,
            size: 0,
            addrs: [NULL_PTR; NDIRECT],
            stat: Stat::default(),
        }
    }

    /// A fresh inode owned by the calling process. `perm` holds permission bits only.
    pub fn new(ino: u32, kind: FileKind, perm: u32) -> Self {
        let t = now();
        let (type_bits, nlink) = match kind {
            FileKind::Directory => (libc::S_IFDIR, 2),
            FileKind::File => (libc::S_IFREG, 1),
        };
        Self {
            ino,
            valid: true,
            kind,
            nlink,
            size: 0,
            addrs: [NULL_PTR; NDIRECT],
            stat: Stat {
                uid: unsafe { getuid() },
                gid: unsafe { getgid() },
                mode: type_bits as u32 | (perm & 0o7777),
                atime: t,
                mtime: t,
                ctime: t,
            },
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Allocated direct pointers as `(slot, data block number)`, in slot order.
    pub fn blocks(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.addrs
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, bno)| bno != NULL_PTR)
    }

    pub fn touch(&mut self) {
        let t = now();
        self.stat.mtime = t;
        self.stat.ctime = t;
    }
}

/// The packed inode region `[start, start + ceil(ninodes / IPB))`.
pub struct InodeTable {
    start: usize,
    ninodes: u32,
    /// serializes read-modify-write of shared inode blocks
    lock: Mutex<()>,
}

impl InodeTable {
    pub fn new(start: usize, ninodes: u32) -> Self {
        Self {
            start,
            ninodes,
            lock: Mutex::new(()),
        }
    }

    /// inode number -> (block number, byte offset)
    fn locate(&self, ino: u32) -> Result<(usize, usize)> {
        if ino >= self.ninodes {
            return Err(FsError::InvalidIndex {
                index: ino as usize,
                limit: self.ninodes as usize,
            });
        }
        let ino = ino as usize;
        Ok((self.start + ino / IPB, (ino % IPB) * INODE_SIZE))
    }

    pub fn read(&self, dev: &dyn BlockDevice, ino: u32) -> Result<DInode> {
        let (blockno, offset) = self.locate(ino)?;
        let _guard = lock(&self.lock);
        let bp = Buffer::bread(dev, blockno)?;
        trace!("readi {}", ino);
        bp.decode(offset, INODE_SIZE)
    }

    pub fn write(&self, dev: &dyn BlockDevice, ino: u32, dinode: &DInode) -> Result<()> {
        let (blockno, offset) = self.locate(ino)?;
        let _guard = lock(&self.lock);
        let mut bp = Buffer::bread(dev, blockno)?;
        bp.encode(offset, INODE_SIZE, dinode)?;
        trace!("writei {}", ino);
        bp.bwrite(dev)
    }
}

impl From<&DInode> for fuser::FileAttr {
    fn from(value: &DInode) -> Self {
        let time = |secs: u64| UNIX_EPOCH + Duration::from_secs(secs);
        let blocks = (value.blocks().count() * (BSIZE / 512)) as u64;
        fuser::FileAttr {
            ino: value.ino as u64,
            size: value.size,
            blocks,
            atime: time(value.stat.atime),
            mtime: time(value.stat.mtime),
            ctime: time(value.stat.ctime),
            crtime: time(value.stat.ctime),
            kind: value.kind.into(),
            perm: (value.stat.mode & 0o7777) as u16,
            nlink: value.nlink,
            uid: value.stat.uid,
            gid: value.stat.gid,
            rdev: 0,
            blksize: BSIZE as u32,
            flags: 0,
        }
    }
}
