use super::*;
use bitmap::BitMap;
use block_device::BlockDevice;
use buf::Buffer;
use disk::FileDisk;
use error::{FsError, Pool, Result};
use ilock::InodeLockManager;
use inode::{DInode, FileKind, InodeTable};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Size of the pools a filesystem is formatted with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub max_inum: u32,
    pub max_dnum: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            max_inum: DEFAULT_MAX_INUM,
            max_dnum: DEFAULT_MAX_DNUM,
        }
    }
}

impl Geometry {
    /// Blocks needed to hold the packed inode records.
    pub fn inode_blocks(&self) -> usize {
        (self.max_inum as usize * INODE_SIZE).div_ceil(BSIZE)
    }

    pub fn total_blocks(&self) -> usize {
        INODE_START_BLK + self.inode_blocks() + self.max_dnum as usize
    }

    fn validate(&self) -> Result<()> {
        for (what, n) in [("inode", self.max_inum), ("data block", self.max_dnum)] {
            if n == 0 || n as usize > BPB {
                return Err(FsError::InvalidGeometry(format!(
                    "{} count {} not in 1..={}",
                    what, n, BPB
                )));
            }
        }
        Ok(())
    }
}

/// Block 0. Fixed once the filesystem is formatted.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SuperBlock {
    /// Must be FSMAGIC
    pub magic: u32,
    pub max_inum: u32,
    pub max_dnum: u32,
    /// Block number of the inode bitmap
    pub i_bitmap_blk: u32,
    /// Block number of the data bitmap
    pub d_bitmap_blk: u32,
    /// Block number of first inode block
    pub i_start_blk: u32,
    /// Block number of data block 0
    pub d_start_blk: u32,
}

impl SuperBlock {
    pub fn new(geo: Geometry) -> Self {
        Self {
            magic: FSMAGIC,
            max_inum: geo.max_inum,
            max_dnum: geo.max_dnum,
            i_bitmap_blk: INODE_BITMAP_BLK as u32,
            d_bitmap_blk: DATA_BITMAP_BLK as u32,
            i_start_blk: INODE_START_BLK as u32,
            d_start_blk: (INODE_START_BLK + geo.inode_blocks()) as u32,
        }
    }

    pub fn geometry(&self) -> Geometry {
        Geometry {
            max_inum: self.max_inum,
            max_dnum: self.max_dnum,
        }
    }

    pub fn total_blocks(&self) -> usize {
        self.d_start_blk as usize + self.max_dnum as usize
    }

    fn readsb(dev: &dyn BlockDevice) -> Result<Self> {
        let bp = Buffer::bread(dev, SUPER_BLK)?;
        let sb: SuperBlock = bp.decode(0, BSIZE)?;
        if sb.magic != FSMAGIC {
            return Err(FsError::BadMagic(sb.magic));
        }
        sb.geometry().validate()?;
        if sb.d_start_blk as usize != INODE_START_BLK + sb.geometry().inode_blocks() {
            return Err(FsError::Corrupted(format!(
                "data region starts at {}",
                sb.d_start_blk
            )));
        }
        Ok(sb)
    }

    fn writesb(&self, dev: &dyn BlockDevice) -> Result<()> {
        let mut bp = Buffer::zeroed(SUPER_BLK);
        bp.encode(0, BSIZE, self)?;
        bp.bwrite(dev)
    }
}

/// Counters reported by [`FileSystem::statfs`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatFs {
    pub blocks: u64,
    pub free_blocks: u64,
    pub inodes: u64,
    pub free_inodes: u64,
    pub bsize: u32,
    pub namelen: u32,
}

/// A mounted filesystem.
///
/// Everything mutable lives on the device; the struct only carries the
/// superblock read at mount time and the locks that order access.
pub struct FileSystem {
    dev: Arc<dyn BlockDevice>,
    sb: SuperBlock,
    imap: Mutex<BitMap>,
    dmap: Mutex<BitMap>,
    itable: InodeTable,
    pub(crate) ilocks: InodeLockManager,
}

impl FileSystem {
    fn with_superblock(dev: Arc<dyn BlockDevice>, sb: SuperBlock) -> Self {
        Self {
            imap: Mutex::new(BitMap::new(
                sb.i_bitmap_blk as usize,
                sb.max_inum as usize,
                Pool::Inode,
            )),
            dmap: Mutex::new(BitMap::new(
                sb.d_bitmap_blk as usize,
                sb.max_dnum as usize,
                Pool::Block,
            )),
            itable: InodeTable::new(sb.i_start_blk as usize, sb.max_inum),
            ilocks: InodeLockManager::new(),
            dev,
            sb,
        }
    }

    /// Lay a fresh filesystem over `dev`: superblock, empty bitmaps, a
    /// zeroed inode region and the root directory.
    pub fn format(dev: Arc<dyn BlockDevice>, geo: Geometry) -> Result<Self> {
        geo.validate()?;
        let sb = SuperBlock::new(geo);
        if dev.block_count() < sb.total_blocks() {
            return Err(FsError::InvalidGeometry(format!(
                "device has {} blocks, layout needs {}",
                dev.block_count(),
                sb.total_blocks()
            )));
        }
        sb.writesb(dev.as_ref())?;
        let fs = Self::with_superblock(dev, sb);

        {
            let imap = lock(&fs.imap);
            let dmap = lock(&fs.dmap);
            imap.reset(fs.dev())?;
            dmap.reset(fs.dev())?;
            imap.mark(fs.dev(), ROOTINO as usize)?;
            dmap.mark(fs.dev(), 0)?;
        }
        for blockno in sb.i_start_blk..sb.d_start_blk {
            Buffer::zeroed(blockno as usize).bwrite(fs.dev())?;
        }

        let mut bp = fs.data_buffer(0)?;
        dir::init_block_with(&mut bp, "/", ROOTINO);
        bp.bwrite(fs.dev())?;

        let mut root = DInode::new(ROOTINO, FileKind::Directory, 0o755);
        root.addrs[0] = 0;
        root.size = BSIZE as u64;
        fs.writei(&root)?;

        info!(
            "formatted: {} inodes, {} data blocks, data region at block {}",
            sb.max_inum, sb.max_dnum, sb.d_start_blk
        );
        Ok(fs)
    }

    /// Read the superblock of an already formatted device.
    pub fn load(dev: Arc<dyn BlockDevice>) -> Result<Self> {
        let sb = SuperBlock::readsb(dev.as_ref())?;
        if dev.block_count() < sb.total_blocks() {
            return Err(FsError::Corrupted(format!(
                "image holds {} blocks, superblock describes {}",
                dev.block_count(),
                sb.total_blocks()
            )));
        }
        debug!("loaded superblock {:?}", sb);
        Ok(Self::with_superblock(dev, sb))
    }

    /// Mount the image at `path`, formatting a new one with the default
    /// geometry when it does not exist yet.
    pub fn mount<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::mount_with(path, Geometry::default())
    }

    /// Like [`FileSystem::mount`]; `geo` only matters if the image is created.
    pub fn mount_with<P: AsRef<Path>>(path: P, geo: Geometry) -> Result<Self> {
        let path = path.as_ref();
        match FileDisk::open(path) {
            Ok(disk) => {
                info!("mounting {}", path.display());
                Self::load(Arc::new(disk))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("{} not found, formatting", path.display());
                Self::mkfs(path, geo)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create (or overwrite) the image at `path` and format it.
    pub fn mkfs<P: AsRef<Path>>(path: P, geo: Geometry) -> Result<Self> {
        geo.validate()?;
        let disk = FileDisk::init(path, geo.total_blocks())?;
        Self::format(Arc::new(disk), geo)
    }

    pub fn unmount(self) -> Result<()> {
        self.dev.close()?;
        info!("unmounted");
        Ok(())
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.sb
    }

    pub(crate) fn dev(&self) -> &dyn BlockDevice {
        self.dev.as_ref()
    }

    pub fn readi(&self, ino: u32) -> Result<DInode> {
        self.itable.read(self.dev(), ino)
    }

    pub fn writei(&self, dinode: &DInode) -> Result<()> {
        self.itable.write(self.dev(), dinode.ino, dinode)
    }

    pub(crate) fn ialloc(&self) -> Result<u32> {
        Ok(lock(&self.imap).alloc(self.dev())? as u32)
    }

    pub(crate) fn ifree(&self, ino: u32) -> Result<()> {
        lock(&self.imap).dealloc(self.dev(), ino as usize)
    }

    pub(crate) fn balloc(&self) -> Result<u32> {
        Ok(lock(&self.dmap).alloc(self.dev())? as u32)
    }

    pub(crate) fn bfree(&self, dno: u32) -> Result<()> {
        lock(&self.dmap).dealloc(self.dev(), dno as usize)
    }

    /// data block number -> device block number
    fn data_blockno(&self, dno: u32) -> Result<usize> {
        if dno >= self.sb.max_dnum {
            return Err(FsError::InvalidIndex {
                index: dno as usize,
                limit: self.sb.max_dnum as usize,
            });
        }
        Ok(self.sb.d_start_blk as usize + dno as usize)
    }

    pub(crate) fn bread_data(&self, dno: u32) -> Result<Buffer> {
        Buffer::bread(self.dev(), self.data_blockno(dno)?)
    }

    /// A zero-filled buffer addressed at data block `dno`, not read from disk.
    pub(crate) fn data_buffer(&self, dno: u32) -> Result<Buffer> {
        Ok(Buffer::zeroed(self.data_blockno(dno)?))
    }

    /// Clear the record of an unreferenced inode, then give back its blocks
    /// and its number.
    pub(crate) fn release(&self, dinode: &DInode) -> Result<()> {
        self.writei(&DInode::empty(dinode.ino))?;
        for (_, dno) in dinode.blocks() {
            self.bfree(dno)?;
        }
        self.ifree(dinode.ino)?;
        debug!("released inode {}", dinode.ino);
        Ok(())
    }

    /// Roll back a provisional allocation; failures are only logged since
    /// the caller is already reporting an error.
    pub(crate) fn discard(&self, dinode: &DInode) {
        if let Err(e) = self.release(dinode) {
            warn!("leaking inode {}: {}", dinode.ino, e);
        }
    }

    pub fn statfs(&self) -> Result<StatFs> {
        let used_inodes = lock(&self.imap).used(self.dev())?;
        let used_blocks = lock(&self.dmap).used(self.dev())?;
        Ok(StatFs {
            blocks: self.sb.max_dnum as u64,
            free_blocks: (self.sb.max_dnum as usize - used_blocks) as u64,
            inodes: self.sb.max_inum as u64,
            free_inodes: (self.sb.max_inum as usize - used_inodes) as u64,
            bsize: BSIZE as u32,
            namelen: DIRSIZ as u32,
        })
    }
}
