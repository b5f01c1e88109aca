//! Path-based operations a host front end (FUSE or otherwise) calls into.
//!
//! Paths are resolved hand-over-hand under the inode locks, and every
//! operation keeps the lock of the inode it acts on until it is done. Removal
//! and creation hold the parent directory's lock, then the child's.

use super::*;
use dir::check_name;
use error::{FsError, Result};
use fs::FileSystem;
use inode::{now, DInode, FileKind};
use path::{components, Locked};

use log::{debug, info, warn};
use std::cmp::{max, min};

/// One line of a directory listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirListing {
    pub name: String,
    pub ino: u32,
    pub kind: FileKind,
}

impl FileSystem {
    pub fn getattr(&self, path: &str) -> Result<fuser::FileAttr> {
        let target = self.namei_locked(path)?;
        Ok(fuser::FileAttr::from(&target.dinode))
    }

    /// Resolve a directory that is about to be listed.
    pub fn opendir(&self, path: &str) -> Result<DInode> {
        Ok(self.opendir_locked(path)?.dinode)
    }

    fn opendir_locked(&self, path: &str) -> Result<Locked> {
        let dir = self.namei_locked(path)?;
        if !dir.dinode.is_dir() {
            return Err(FsError::NotADirectory);
        }
        Ok(dir)
    }

    /// Resolve a regular file that is about to be read or written.
    pub fn open(&self, path: &str) -> Result<DInode> {
        Ok(self.open_locked(path)?.dinode)
    }

    fn open_locked(&self, path: &str) -> Result<Locked> {
        let file = self.namei_locked(path)?;
        if file.dinode.is_dir() {
            return Err(FsError::IsADirectory);
        }
        Ok(file)
    }

    /// Entries of the directory at `path`, without the root's "/" self entry.
    pub fn readdir(&self, path: &str) -> Result<Vec<DirListing>> {
        let dir = self.opendir_locked(path)?;

        let mut listing = Vec::new();
        for de in self.dir_entries(&dir.dinode)? {
            if de.name() == "/" {
                continue;
            }
            // children cannot go away while the directory is locked
            let child = self.readi(de.ino)?;
            listing.push(DirListing {
                name: de.name().to_string(),
                ino: de.ino,
                kind: child.kind,
            });
        }
        Ok(listing)
    }

    pub fn mkdir(&self, path: &str, perm: u32) -> Result<DInode> {
        self.create_child(path, FileKind::Directory, perm)
    }

    pub fn create(&self, path: &str, perm: u32) -> Result<DInode> {
        self.create_child(path, FileKind::File, perm)
    }

    fn create_child(&self, path: &str, kind: FileKind, perm: u32) -> Result<DInode> {
        let (mut parent, name, trailing) = self.nameiparent_locked(path)?;
        if trailing && kind == FileKind::File {
            return Err(FsError::IsADirectory);
        }
        check_name(&name)?;
        match self.dir_find(&parent.dinode, &name) {
            Ok(_) => return Err(FsError::AlreadyExists),
            Err(FsError::NotFound) => {}
            Err(e) => return Err(e),
        }

        // allocate and persist the child before anything can point at it
        let ino = self.ialloc()?;
        let mut child = DInode::new(ino, kind, perm);
        if let Err(e) = self.init_child(&mut child) {
            self.discard(&child);
            return Err(e);
        }
        if let Err(e) = self.dir_insert(&mut parent.dinode, &name, ino) {
            self.discard(&child);
            return Err(e);
        }
        info!("{} {:?} as inode {}", if child.is_dir() { "mkdir" } else { "create" }, path, ino);
        Ok(child)
    }

    /// Give a new directory its first, empty block; write the record.
    fn init_child(&self, child: &mut DInode) -> Result<()> {
        if child.is_dir() {
            let dno = self.balloc()?;
            child.addrs[0] = dno;
            child.size = BSIZE as u64;
            let mut bp = self.data_buffer(dno)?;
            dir::init_block(&mut bp);
            bp.bwrite(self.dev())?;
        }
        self.writei(child)
    }

    pub fn rmdir(&self, path: &str) -> Result<()> {
        if components(path)?.is_empty() {
            return Err(FsError::Busy);
        }
        self.remove_child(path, FileKind::Directory)
    }

    pub fn unlink(&self, path: &str) -> Result<()> {
        self.remove_child(path, FileKind::File)
    }

    /// Drop the entry first, then reclaim the child: no entry ever names a
    /// freed inode.
    fn remove_child(&self, path: &str, kind: FileKind) -> Result<()> {
        let (mut parent, name, trailing) = self.nameiparent_locked(path)?;
        let de = self.dir_find(&parent.dinode, &name)?;

        let _cguard = self.ilocks.lock(de.ino);
        let child = self.reload(de.ino)?;
        match (kind, child.kind) {
            (FileKind::Directory, FileKind::File) => return Err(FsError::NotADirectory),
            (FileKind::File, FileKind::File) if trailing => return Err(FsError::NotADirectory),
            (FileKind::File, FileKind::Directory) => return Err(FsError::IsADirectory),
            _ => {}
        }
        if child.is_dir() && !self.dir_entries(&child)?.is_empty() {
            return Err(FsError::NotEmpty);
        }

        let parent = &mut parent.dinode;
        self.dir_remove(parent, &name)?;
        parent.touch();
        self.writei(parent)?;
        self.dir_compact(parent)?;
        self.release(&child)?;
        info!("removed {:?} (inode {})", path, child.ino);
        Ok(())
    }

    /// Up to `len` bytes starting at `offset`; short at end of file.
    pub fn read(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>> {
        let locked = self.open_locked(path)?;
        let file = &locked.dinode;
        if offset >= file.size {
            return Ok(Vec::new());
        }

        let start = offset as usize;
        let end = min(file.size as usize, start.saturating_add(len));
        let mut out = Vec::with_capacity(end - start);
        let mut pos = start;
        while pos < end {
            let boff = pos % BSIZE;
            let n = min(BSIZE - boff, end - pos);
            match file.addrs[pos / BSIZE] {
                // hole
                NULL_PTR => out.resize(out.len() + n, 0),
                dno => {
                    let bp = self.bread_data(dno)?;
                    out.extend_from_slice(&bp.data[boff..boff + n]);
                }
            }
            pos += n;
        }
        debug!("read inode {}: {} bytes at {}", file.ino, out.len(), offset);
        Ok(out)
    }

    /// Write all of `data` at `offset`, growing the file as needed.
    ///
    /// If a block cannot be allocated, every block this call allocated is
    /// given back and the inode is left as it was.
    pub fn write(&self, path: &str, offset: u64, data: &[u8]) -> Result<usize> {
        let mut locked = self.open_locked(path)?;
        let end = offset
            .checked_add(data.len() as u64)
            .filter(|&end| end <= MAXFILE as u64)
            .ok_or(FsError::FileTooLarge)?;
        if data.is_empty() {
            return Ok(0);
        }

        let file = &mut locked.dinode;
        let mut fresh = Vec::new();
        let written = self.write_blocks(file, offset as usize, data, &mut fresh).and_then(|_| {
            file.size = max(file.size, end);
            file.touch();
            self.writei(file)
        });
        if let Err(e) = written {
            for slot in fresh {
                if let Err(free_err) = self.bfree(file.addrs[slot]) {
                    warn!("inode {}: leaking block {}: {}", file.ino, file.addrs[slot], free_err);
                }
            }
            return Err(e);
        }
        debug!("write inode {}: {} bytes at {}", file.ino, data.len(), offset);
        Ok(data.len())
    }

    /// Copy `data` into the file's blocks, allocating missing ones. Slots of
    /// newly allocated blocks are pushed onto `fresh`.
    fn write_blocks(
        &self,
        file: &mut DInode,
        offset: usize,
        data: &[u8],
        fresh: &mut Vec<usize>,
    ) -> Result<()> {
        let mut pos = offset;
        let mut src = data;
        while !src.is_empty() {
            let slot = pos / BSIZE;
            let boff = pos % BSIZE;
            let n = min(BSIZE - boff, src.len());
            let mut bp = match file.addrs[slot] {
                NULL_PTR => {
                    let dno = self.balloc()?;
                    file.addrs[slot] = dno;
                    fresh.push(slot);
                    self.data_buffer(dno)?
                }
                dno if n == BSIZE => self.data_buffer(dno)?,
                dno => self.bread_data(dno)?,
            };
            bp.data[boff..boff + n].copy_from_slice(&src[..n]);
            bp.bwrite(self.dev())?;
            pos += n;
            src = &src[n..];
        }
        Ok(())
    }

    /// Set the file's size. Blocks past the new end are detached and
    /// persisted before they are freed.
    pub fn truncate(&self, path: &str, size: u64) -> Result<()> {
        if size > MAXFILE as u64 {
            return Err(FsError::FileTooLarge);
        }
        let mut locked = self.open_locked(path)?;
        let file = &mut locked.dinode;

        let mut dropped = Vec::new();
        if size < file.size {
            let keep = (size as usize).div_ceil(BSIZE);
            for slot in keep..NDIRECT {
                if file.addrs[slot] != NULL_PTR {
                    dropped.push(file.addrs[slot]);
                    file.addrs[slot] = NULL_PTR;
                }
            }
            // later growth must read zeros past the new end
            let tail = size as usize % BSIZE;
            if tail != 0 {
                let dno = file.addrs[size as usize / BSIZE];
                if dno != NULL_PTR {
                    let mut bp = self.bread_data(dno)?;
                    bp.data[tail..].fill(0);
                    bp.bwrite(self.dev())?;
                }
            }
        }
        file.size = size;
        file.touch();
        self.writei(file)?;
        for dno in dropped {
            self.bfree(dno)?;
        }
        debug!("truncate inode {} to {}", file.ino, size);
        Ok(())
    }

    /// Set access and modification times; `None` leaves a time as it is.
    pub fn utimens(&self, path: &str, atime: Option<u64>, mtime: Option<u64>) -> Result<()> {
        let mut locked = self.namei_locked(path)?;
        let dinode = &mut locked.dinode;
        if let Some(atime) = atime {
            dinode.stat.atime = atime;
        }
        if let Some(mtime) = mtime {
            dinode.stat.mtime = mtime;
        }
        dinode.stat.ctime = now();
        self.writei(dinode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use block_device::MemDisk;
    use fs::Geometry;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn small_fs(max_dnum: u32) -> FileSystem {
        fs_with(32, max_dnum)
    }

    fn fs_with(max_inum: u32, max_dnum: u32) -> FileSystem {
        let geo = Geometry { max_inum, max_dnum };
        FileSystem::format(Arc::new(MemDisk::new(geo.total_blocks())), geo).unwrap()
    }

    fn names(fs: &FileSystem, path: &str) -> Vec<String> {
        fs.readdir(path).unwrap().into_iter().map(|e| e.name).collect()
    }

    #[test]
    fn mkdir_and_readdir() {
        let fs = small_fs(64);
        assert!(names(&fs, "/").is_empty());
        let x = fs.mkdir("/x", 0o755).unwrap();
        fs.create("/x/f", 0o644).unwrap();
        fs.mkdir("/x/sub", 0o700).unwrap();

        let root = fs.readdir("/").unwrap();
        assert_eq!(
            root,
            vec![DirListing {
                name: "x".into(),
                ino: x.ino,
                kind: FileKind::Directory
            }]
        );
        assert_eq!(names(&fs, "/x"), vec!["f", "sub"]);
        assert!(names(&fs, "/x/sub").is_empty());

        let attr = fs.getattr("/x/sub").unwrap();
        assert_eq!(attr.kind, fuser::FileType::Directory);
        assert_eq!(attr.perm, 0o700);
        assert_eq!(attr.nlink, 2);
        assert_eq!(fs.getattr("/x/f").unwrap().kind, fuser::FileType::RegularFile);
    }

    #[test]
    fn create_errors() {
        let fs = small_fs(64);
        fs.create("/f", 0o644).unwrap();
        assert!(matches!(fs.create("/f", 0o644), Err(FsError::AlreadyExists)));
        assert!(matches!(fs.mkdir("/f", 0o755), Err(FsError::AlreadyExists)));
        assert!(matches!(fs.create("/f/g", 0o644), Err(FsError::NotADirectory)));
        assert!(matches!(fs.create("/nope/g", 0o644), Err(FsError::NotFound)));
        assert!(matches!(fs.mkdir("/", 0o755), Err(FsError::InvalidPath(_))));
        assert!(matches!(fs.create("/..", 0o644), Err(FsError::InvalidPath(_))));
        let long = format!("/{}", "n".repeat(DIRSIZ + 1));
        assert!(matches!(fs.create(&long, 0o644), Err(FsError::NameTooLong(_))));
        assert!(matches!(fs.readdir("/f"), Err(FsError::NotADirectory)));
        assert!(matches!(fs.open("/"), Err(FsError::IsADirectory)));
        // failed attempts leave nothing allocated
        assert_eq!(fs.statfs().unwrap().free_inodes, 30);
    }

    #[test]
    fn write_then_read() {
        let fs = small_fs(64);
        fs.create("/f", 0o644).unwrap();
        let data: Vec<u8> = (0..3 * BSIZE + 100).map(|i| (i % 251) as u8).collect();
        assert_eq!(fs.write("/f", 0, &data).unwrap(), data.len());
        assert_eq!(fs.read("/f", 0, data.len()).unwrap(), data);
        assert_eq!(fs.getattr("/f").unwrap().size, data.len() as u64);

        // straddle a block boundary
        let mid = fs.read("/f", BSIZE as u64 - 10, 20).unwrap();
        assert_eq!(mid, &data[BSIZE - 10..BSIZE + 10]);

        // clamp at end of file
        assert_eq!(fs.read("/f", data.len() as u64 - 5, 100).unwrap().len(), 5);
        assert!(fs.read("/f", data.len() as u64 + 1, 10).unwrap().is_empty());

        // overwrite in the middle keeps the size
        fs.write("/f", 10, b"hello").unwrap();
        assert_eq!(fs.read("/f", 8, 9).unwrap(), [&data[8..10], &b"hello"[..], &data[15..17]].concat());
        assert_eq!(fs.getattr("/f").unwrap().size, data.len() as u64);
    }

    #[test]
    fn sparse_write_reads_zeros() {
        let fs = small_fs(64);
        fs.create("/f", 0o644).unwrap();
        let free = fs.statfs().unwrap().free_blocks;
        fs.write("/f", 5 * BSIZE as u64 + 1, b"x").unwrap();
        assert_eq!(fs.statfs().unwrap().free_blocks, free - 1);
        let all = fs.read("/f", 0, 6 * BSIZE).unwrap();
        assert_eq!(all.len(), 5 * BSIZE + 2);
        assert!(all[..5 * BSIZE + 1].iter().all(|&b| b == 0));
        assert_eq!(all[5 * BSIZE + 1], b'x');
    }

    #[test]
    fn write_limits() {
        let fs = small_fs(64);
        fs.create("/f", 0o644).unwrap();
        fs.mkdir("/d", 0o755).unwrap();
        assert!(matches!(fs.write("/d", 0, b"x"), Err(FsError::IsADirectory)));
        assert!(matches!(fs.read("/d", 0, 1), Err(FsError::IsADirectory)));
        assert!(matches!(
            fs.write("/f", MAXFILE as u64, b"x"),
            Err(FsError::FileTooLarge)
        ));
        assert_eq!(fs.write("/f", MAXFILE as u64 - 1, b"x").unwrap(), 1);
        assert_eq!(fs.getattr("/f").unwrap().size, MAXFILE as u64);
    }

    #[test]
    fn failed_write_gives_blocks_back() {
        // root takes block 0; four more are left
        let fs = small_fs(5);
        fs.create("/f", 0o644).unwrap();
        fs.write("/f", 0, b"keep").unwrap();
        let before = fs.namei("/f").unwrap();
        assert_eq!(fs.statfs().unwrap().free_blocks, 3);

        let big = vec![7u8; 5 * BSIZE];
        assert!(matches!(
            fs.write("/f", 0, &big),
            Err(FsError::Exhausted(error::Pool::Block))
        ));
        assert_eq!(fs.statfs().unwrap().free_blocks, 3);
        let after = fs.namei("/f").unwrap();
        assert_eq!(after.addrs, before.addrs);
        assert_eq!(after.size, 4);
    }

    #[test]
    fn unlink_reclaims() {
        let fs = small_fs(64);
        let before = fs.statfs().unwrap();
        fs.create("/f", 0o644).unwrap();
        fs.write("/f", 0, &vec![1u8; 2 * BSIZE]).unwrap();
        assert_eq!(fs.statfs().unwrap().free_blocks, before.free_blocks - 2);

        let ino = fs.namei("/f").unwrap().ino;
        fs.unlink("/f").unwrap();
        assert!(matches!(fs.namei("/f"), Err(FsError::NotFound)));
        assert_eq!(fs.statfs().unwrap(), before);
        assert!(!fs.readi(ino).unwrap().valid);

        assert!(matches!(fs.unlink("/f"), Err(FsError::NotFound)));
        fs.mkdir("/d", 0o755).unwrap();
        assert!(matches!(fs.unlink("/d"), Err(FsError::IsADirectory)));
    }

    #[test]
    fn rmdir_rules() {
        let fs = small_fs(64);
        let before = fs.statfs().unwrap();
        fs.mkdir("/d", 0o755).unwrap();
        fs.create("/d/f", 0o644).unwrap();
        fs.create("/g", 0o644).unwrap();

        assert!(matches!(fs.rmdir("/"), Err(FsError::Busy)));
        assert!(matches!(fs.rmdir("/d"), Err(FsError::NotEmpty)));
        assert!(matches!(fs.rmdir("/g"), Err(FsError::NotADirectory)));

        fs.unlink("/d/f").unwrap();
        fs.rmdir("/d").unwrap();
        fs.unlink("/g").unwrap();
        assert!(names(&fs, "/").is_empty());
        assert_eq!(fs.statfs().unwrap(), before);

        // the freed inode number is handed out again
        let again = fs.mkdir("/again", 0o755).unwrap();
        assert_eq!(again.ino, 1);
    }

    #[test]
    fn truncate_shrinks_and_grows() {
        let fs = small_fs(64);
        fs.create("/f", 0o644).unwrap();
        fs.write("/f", 0, &vec![9u8; 3 * BSIZE]).unwrap();
        let free = fs.statfs().unwrap().free_blocks;

        fs.truncate("/f", BSIZE as u64 + 10).unwrap();
        assert_eq!(fs.statfs().unwrap().free_blocks, free + 1);
        assert_eq!(fs.getattr("/f").unwrap().size, BSIZE as u64 + 10);

        fs.truncate("/f", 2 * BSIZE as u64).unwrap();
        let tail = fs.read("/f", BSIZE as u64, BSIZE).unwrap();
        assert!(tail[..10].iter().all(|&b| b == 9));
        assert!(tail[10..].iter().all(|&b| b == 0));

        fs.truncate("/f", 0).unwrap();
        assert_eq!(fs.statfs().unwrap().free_blocks, free + 3);
        assert!(matches!(
            fs.truncate("/f", MAXFILE as u64 + 1),
            Err(FsError::FileTooLarge)
        ));
    }

    #[test]
    fn utimens_sets_times() {
        let fs = small_fs(64);
        fs.create("/f", 0o644).unwrap();
        fs.utimens("/f", Some(100), None).unwrap();
        let f = fs.namei("/f").unwrap();
        assert_eq!(f.stat.atime, 100);
        assert_ne!(f.stat.mtime, 100);
        fs.utimens("/f", None, Some(200)).unwrap();
        assert_eq!(fs.namei("/f").unwrap().stat.mtime, 200);
    }

    #[test]
    fn concurrent_creates() {
        let fs = Arc::new(small_fs(64));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let fs = Arc::clone(&fs);
                std::thread::spawn(move || {
                    for i in 0..5 {
                        fs.create(&format!("/t{}-{}", t, i), 0o644).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let mut listed = names(&fs, "/");
        listed.sort();
        assert_eq!(listed.len(), 20);
        let mut inos: Vec<u32> = fs.readdir("/").unwrap().iter().map(|e| e.ino).collect();
        inos.sort();
        inos.dedup();
        assert_eq!(inos.len(), 20);
    }

    #[test]
    fn failed_mkdir_leaves_nothing_behind() {
        let fs = small_fs(64);
        // fill every slot the root can ever have
        let mut root = fs.readi(ROOTINO).unwrap();
        for i in 0..NDIRECT * DPB - 1 {
            fs.dir_insert(&mut root, &format!("e{}", i), ROOTINO).unwrap();
        }
        let before = fs.statfs().unwrap();
        assert!(matches!(fs.mkdir("/new", 0o755), Err(FsError::DirectoryFull)));
        assert!(matches!(fs.create("/new", 0o644), Err(FsError::DirectoryFull)));
        assert_eq!(fs.statfs().unwrap(), before);
        assert!(!fs.readi(1).unwrap().valid);
    }

    #[test]
    fn mkdir_without_blocks_gives_inode_back() {
        // the root owns the only data block
        let fs = small_fs(1);
        let before = fs.statfs().unwrap();
        assert!(matches!(
            fs.mkdir("/d", 0o755),
            Err(FsError::Exhausted(error::Pool::Block))
        ));
        assert_eq!(fs.statfs().unwrap(), before);
        // files need no block up front
        fs.create("/f", 0o644).unwrap();
    }

    #[test]
    fn inode_pool_runs_dry() {
        let fs = small_fs(64);
        for i in 1..32 {
            fs.create(&format!("/f{}", i), 0o644).unwrap();
        }
        let before = fs.statfs().unwrap();
        assert_eq!(before.free_inodes, 0);
        assert!(matches!(
            fs.create("/extra", 0o644),
            Err(FsError::Exhausted(error::Pool::Inode))
        ));
        assert!(matches!(
            fs.mkdir("/extra", 0o755),
            Err(FsError::Exhausted(error::Pool::Inode))
        ));
        assert_eq!(fs.statfs().unwrap(), before);
        assert_eq!(fs.readdir("/").unwrap().len(), 31);

        fs.unlink("/f7").unwrap();
        assert_eq!(fs.create("/extra", 0o644).unwrap().ino, 7);
    }

    #[test]
    fn trailing_slash() {
        let fs = small_fs(64);
        assert!(matches!(fs.create("/f/", 0o644), Err(FsError::IsADirectory)));
        assert!(matches!(fs.namei("/f"), Err(FsError::NotFound)));
        fs.create("/f", 0o644).unwrap();
        assert!(matches!(fs.getattr("/f/"), Err(FsError::NotADirectory)));
        assert!(matches!(fs.read("/f/", 0, 1), Err(FsError::NotADirectory)));
        assert!(matches!(fs.unlink("/f/"), Err(FsError::NotADirectory)));
        fs.unlink("/f").unwrap();

        fs.mkdir("/d/", 0o755).unwrap();
        assert!(fs.opendir("/d/").unwrap().is_dir());
        fs.rmdir("/d/").unwrap();
    }

    #[test]
    fn write_does_not_follow_a_reused_inode() {
        let fs = Arc::new(small_fs(64));
        let a = fs.create("/a", 0o644).unwrap();
        // hold /a so the writer has to wait for it
        let held = fs.ilocks.lock(a.ino);

        let writer = {
            let fs = Arc::clone(&fs);
            thread::spawn(move || fs.write("/a", 0, b"meant for /a"))
        };
        thread::sleep(Duration::from_millis(50));
        let replacer = {
            let fs = Arc::clone(&fs);
            thread::spawn(move || {
                fs.unlink("/a").unwrap();
                fs.create("/b", 0o644).unwrap()
            })
        };
        thread::sleep(Duration::from_millis(50));
        drop(held);

        let wrote = writer.join().unwrap();
        let b = replacer.join().unwrap();
        assert_eq!(b.ino, a.ino);
        assert!(matches!(wrote, Ok(12) | Err(FsError::NotFound)), "{:?}", wrote);
        assert!(fs.read("/b", 0, 64).unwrap().is_empty());
        assert_eq!(fs.getattr("/b").unwrap().size, 0);
    }

    #[test]
    fn lookups_survive_directory_shrinking() {
        let fs = Arc::new(fs_with(128, 256));
        fs.mkdir("/d", 0o755).unwrap();
        fs.create("/d/keep", 0o644).unwrap();
        let done = Arc::new(AtomicBool::new(false));

        let churn = {
            let fs = Arc::clone(&fs);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                for _ in 0..10 {
                    // the 64th name spills into a second block
                    for i in 0..DPB {
                        fs.create(&format!("/d/f{}", i), 0o644).unwrap();
                    }
                    for i in 0..DPB {
                        fs.unlink(&format!("/d/f{}", i)).unwrap();
                    }
                    // reuse the freed block for bytes that are not dirents
                    fs.create("/junk", 0o644).unwrap();
                    fs.write("/junk", 0, &vec![1u8; 4 * BSIZE]).unwrap();
                    fs.unlink("/junk").unwrap();
                }
                done.store(true, Ordering::SeqCst);
            })
        };
        while !done.load(Ordering::SeqCst) {
            assert_eq!(fs.namei("/d/keep").unwrap().kind, FileKind::File);
            assert!(fs.readdir("/d").is_ok());
        }
        churn.join().unwrap();
        assert_eq!(fs.readdir("/d").unwrap().len(), 1);
    }
}
