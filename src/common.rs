//! On-disk layout constants.
//!
//! ```text
//! [ super block | inode bitmap | data bitmap | inode blocks | data blocks ]
//!        0             1              2         3 .. d_start    d_start ..
//! ```

/// Must be in the superblock of every image we mount.
pub const FSMAGIC: u32 = 0x5446_5331;

/// block size
pub const BSIZE: usize = 4096;

pub const SUPER_BLK: usize = 0;
pub const INODE_BITMAP_BLK: usize = 1;
pub const DATA_BITMAP_BLK: usize = 2;
pub const INODE_START_BLK: usize = 3;

/// root i-number
pub const ROOTINO: u32 = 0;

/// direct blocks in inode
pub const NDIRECT: usize = 16;

/// largest file a direct-only inode can describe (bytes)
pub const MAXFILE: usize = NDIRECT * BSIZE;

/// bytes reserved for one inode record
pub const INODE_SIZE: usize = 256;

/// inodes per block
pub const IPB: usize = BSIZE / INODE_SIZE;

/// bits per bitmap block
pub const BPB: usize = BSIZE * 8;

/// bytes of one directory entry
pub const DIRENT_SIZE: usize = 64;

/// directory entries per block
pub const DPB: usize = BSIZE / DIRENT_SIZE;

/// longest name a directory entry can hold
pub const DIRSIZ: usize = 56;

/// Unused direct pointer, and the inode number carried by a free dirent.
pub const NULL_PTR: u32 = u32::MAX;

pub const DEFAULT_MAX_INUM: u32 = 1024;
pub const DEFAULT_MAX_DNUM: u32 = 16384;
