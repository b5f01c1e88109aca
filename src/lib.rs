mod bitmap; // inode and data block bitmaps
pub mod block_device;
mod buf; // one-block buffers
pub mod common;
mod dir; // directory entries
mod disk; // image file on the host
pub mod error;
mod fs; // superblock, mount, allocation
mod ilock;
mod inode;
mod path; // namei
mod vfs; // path-based front-end operations

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use block_device::{BlockDevice, MemDisk};
pub use common::*;
pub use dir::{check_name, DirEnt};
pub use disk::FileDisk;
pub use error::{FsError, Pool};
pub use fs::{FileSystem, Geometry, StatFs, SuperBlock};
pub use inode::{DInode, FileKind, Stat};
pub use path::components;
pub use vfs::DirListing;

/// Lock `m`, carrying on with the data if a previous holder panicked.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
