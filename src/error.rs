use std::fmt;
use std::io;
use std::os::raw::c_int;

use thiserror::Error;

/// Which bitmap ran dry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pool {
    Inode,
    Block,
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pool::Inode => f.write_str("inodes"),
            Pool::Block => f.write_str("data blocks"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("entry already exists")]
    AlreadyExists,
    #[error("directory has no free entry slot left")]
    DirectoryFull,
    #[error("no free {0} left")]
    Exhausted(Pool),
    #[error("invalid path {0:?}")]
    InvalidPath(String),
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("directory not empty")]
    NotEmpty,
    #[error("the root directory cannot be removed")]
    Busy,
    #[error("index {index} out of range (limit {limit})")]
    InvalidIndex { index: usize, limit: usize },
    #[error("name is {0} bytes long")]
    NameTooLong(usize),
    #[error("file would exceed the direct block limit")]
    FileTooLarge,
    #[error("bad superblock magic {0:#x}")]
    BadMagic(u32),
    #[error("corrupted on-disk record: {0}")]
    Corrupted(String),
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Codec(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, FsError>;

impl FsError {
    /// The errno a host front end should hand back for this error.
    pub fn errno(&self) -> c_int {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::AlreadyExists => libc::EEXIST,
            FsError::DirectoryFull | FsError::Exhausted(_) => libc::ENOSPC,
            FsError::InvalidPath(_) | FsError::InvalidIndex { .. } => libc::EINVAL,
            FsError::InvalidGeometry(_) => libc::EINVAL,
            FsError::NotADirectory => libc::ENOTDIR,
            FsError::IsADirectory => libc::EISDIR,
            FsError::NotEmpty => libc::ENOTEMPTY,
            FsError::Busy => libc::EBUSY,
            FsError::NameTooLong(_) => libc::ENAMETOOLONG,
            FsError::FileTooLarge => libc::EFBIG,
            FsError::BadMagic(_) | FsError::Corrupted(_) | FsError::Codec(_) => libc::EIO,
            FsError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}
