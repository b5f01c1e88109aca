//! Path resolution (namei).
//!
//! Paths are absolute and walked forward only: there is no "." or "..", and
//! no symlinks to follow.

use super::*;
use error::{FsError, Result};
use fs::FileSystem;
use ilock::InodeGuard;
use inode::DInode;

/// Split an absolute path into its components. "/" yields none.
///
/// One leading and one trailing '/' are ignored; any other empty component
/// makes the path invalid.
pub fn components(path: &str) -> Result<Vec<&str>> {
    split(path).map(|(names, _)| names)
}

/// Components, and whether the path ended in '/' after a component.
fn split(path: &str) -> Result<(Vec<&str>, bool)> {
    let invalid = || FsError::InvalidPath(path.to_string());
    let rest = path.strip_prefix('/').ok_or_else(invalid)?;
    if rest.is_empty() {
        return Ok((Vec::new(), false));
    }
    let (rest, trailing) = match rest.strip_suffix('/') {
        Some(rest) => (rest, true),
        None => (rest, false),
    };
    let names: Vec<&str> = rest.split('/').collect();
    if names.iter().any(|name| name.is_empty()) {
        return Err(invalid());
    }
    Ok((names, trailing))
}

/// An inode read while holding its lock. The lock goes with the value.
pub(crate) struct Locked {
    pub(crate) dinode: DInode,
    _guard: InodeGuard,
}

impl FileSystem {
    /// Fresh copy of a live inode. The caller holds its lock.
    pub(crate) fn reload(&self, ino: u32) -> Result<DInode> {
        let dinode = self.readi(ino)?;
        if !dinode.valid {
            return Err(FsError::NotFound);
        }
        Ok(dinode)
    }

    /// Resolve `path` starting from the root directory.
    pub fn namei(&self, path: &str) -> Result<DInode> {
        self.namei_at(path, ROOTINO)
    }

    /// Resolve `path` starting from the directory `root`.
    pub fn namei_at(&self, path: &str, root: u32) -> Result<DInode> {
        let (names, trailing) = split(path)?;
        Ok(self.walk(root, &names, trailing)?.dinode)
    }

    /// Resolve `path` and keep the target locked.
    pub(crate) fn namei_locked(&self, path: &str) -> Result<Locked> {
        let (names, trailing) = split(path)?;
        self.walk(ROOTINO, &names, trailing)
    }

    /// Resolve everything but the last component of `path`, which is returned
    /// alongside the parent directory.
    pub fn nameiparent(&self, path: &str) -> Result<(DInode, String)> {
        let (parent, name, _) = self.nameiparent_locked(path)?;
        Ok((parent.dinode, name))
    }

    /// Like [`FileSystem::nameiparent`], with the parent kept locked. The
    /// flag tells whether `path` ended in '/'.
    pub(crate) fn nameiparent_locked(&self, path: &str) -> Result<(Locked, String, bool)> {
        let (names, trailing) = split(path)?;
        let (last, init) = names
            .split_last()
            .ok_or_else(|| FsError::InvalidPath(path.to_string()))?;
        let parent = self.walk(ROOTINO, init, true)?;
        Ok((parent, last.to_string(), trailing))
    }

    /// Hand-over-hand: each directory stays locked while it is scanned and
    /// until the next one is locked.
    fn walk(&self, root: u32, names: &[&str], want_dir: bool) -> Result<Locked> {
        let mut guard = self.ilocks.lock(root);
        let mut cur = self.reload(root)?;
        for (i, name) in names.iter().enumerate() {
            let de = self.dir_find(&cur, name)?;
            if de.ino == guard.ino() {
                return Err(FsError::Corrupted(format!("{:?} names its own directory", name)));
            }
            let next_guard = self.ilocks.lock(de.ino);
            let next = self.reload(de.ino)?;
            if i + 1 < names.len() && !next.is_dir() {
                return Err(FsError::NotADirectory);
            }
            guard = next_guard;
            cur = next;
        }
        if want_dir && !cur.is_dir() {
            return Err(FsError::NotADirectory);
        }
        Ok(Locked {
            dinode: cur,
            _guard: guard,
        })
    }
}
