//! Directory entries and the operations over a directory's entry slots.
//!
//! A directory's data blocks are arrays of `DPB` fixed 64-byte slots:
//!
//! | offset | size | field                         |
//! |--------|------|-------------------------------|
//! | 0      | 4    | child inode number            |
//! | 4      | 2    | name length                   |
//! | 6      | 1    | valid (1) / free (0)          |
//! | 7      | 1    | reserved                      |
//! | 8      | 56   | name bytes, zero padded       |
//!
//! A free slot has valid 0, inode `NULL_PTR`, length 0 and a zeroed name.

use super::*;
use buf::Buffer;
use error::{FsError, Result};
use fs::FileSystem;
use inode::DInode;

use log::{debug, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEnt {
    pub valid: bool,
    pub ino: u32,
    len: u16,
    name: [u8; DIRSIZ],
}

impl DirEnt {
    pub fn free() -> Self {
        Self {
            valid: false,
            ino: NULL_PTR,
            len: 0,
            name: [0; DIRSIZ],
        }
    }

    /// Caller has validated `name`.
    fn new(name: &str, ino: u32) -> Self {
        let bytes = name.as_bytes();
        let mut buf = [0; DIRSIZ];
        buf[..bytes.len()].copy_from_slice(bytes);
        Self {
            valid: true,
            ino,
            len: bytes.len() as u16,
            name: buf,
        }
    }

    pub fn name(&self) -> &str {
        std::str::from_utf8(&self.name[..self.len as usize]).unwrap_or_default()
    }

    fn matches(&self, name: &str) -> bool {
        self.valid && self.len as usize == name.len() && &self.name[..name.len()] == name.as_bytes()
    }

    fn encode(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.ino.to_le_bytes());
        out[4..6].copy_from_slice(&self.len.to_le_bytes());
        out[6] = self.valid as u8;
        out[7] = 0;
        out[8..DIRENT_SIZE].copy_from_slice(&self.name);
    }

    fn decode(raw: &[u8]) -> Result<Self> {
        match raw[6] {
            0 => return Ok(Self::free()),
            1 => {}
            flag => return Err(FsError::Corrupted(format!("dirent valid flag {}", flag))),
        }
        let ino = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let len = u16::from_le_bytes([raw[4], raw[5]]);
        if len == 0 || len as usize > DIRSIZ {
            return Err(FsError::Corrupted(format!("dirent name length {}", len)));
        }
        let mut name = [0; DIRSIZ];
        name.copy_from_slice(&raw[8..DIRENT_SIZE]);
        if std::str::from_utf8(&name[..len as usize]).is_err() {
            return Err(FsError::Corrupted("dirent name is not utf-8".into()));
        }
        Ok(Self {
            valid: true,
            ino,
            len,
            name,
        })
    }
}

fn slot_range(slot: usize) -> std::ops::Range<usize> {
    slot * DIRENT_SIZE..(slot + 1) * DIRENT_SIZE
}

fn get_slot(bp: &Buffer, slot: usize) -> Result<DirEnt> {
    DirEnt::decode(&bp.data[slot_range(slot)])
}

fn put_slot(bp: &mut Buffer, slot: usize, de: &DirEnt) {
    de.encode(&mut bp.data[slot_range(slot)]);
}

/// Fill every slot of `bp` with the free sentinel.
pub fn init_block(bp: &mut Buffer) {
    let free = DirEnt::free();
    for slot in 0..DPB {
        put_slot(bp, slot, &free);
    }
}

/// Write `bp` as a fresh directory block whose only entry is `name -> ino`.
pub(crate) fn init_block_with(bp: &mut Buffer, name: &str, ino: u32) {
    init_block(bp);
    put_slot(bp, 0, &DirEnt::new(name, ino));
}

/// Names a directory may hold: 1..=DIRSIZ bytes, no '/', not "." or "..".
pub fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(FsError::InvalidPath(name.to_string()));
    }
    if name.len() > DIRSIZ {
        return Err(FsError::NameTooLong(name.len()));
    }
    Ok(())
}

impl FileSystem {
    /// Look `name` up in `dir`, first match in pointer-then-slot order.
    pub fn dir_find(&self, dir: &DInode, name: &str) -> Result<DirEnt> {
        if !dir.is_dir() {
            return Err(FsError::NotADirectory);
        }
        for (_, dno) in dir.blocks() {
            let bp = self.bread_data(dno)?;
            for slot in 0..DPB {
                let de = get_slot(&bp, slot)?;
                if de.matches(name) {
                    return Ok(de);
                }
            }
        }
        Err(FsError::NotFound)
    }

    /// Every valid entry of `dir`, in scan order.
    pub fn dir_entries(&self, dir: &DInode) -> Result<Vec<DirEnt>> {
        if !dir.is_dir() {
            return Err(FsError::NotADirectory);
        }
        let mut entries = Vec::new();
        for (_, dno) in dir.blocks() {
            let bp = self.bread_data(dno)?;
            for slot in 0..DPB {
                let de = get_slot(&bp, slot)?;
                if de.valid {
                    entries.push(de);
                }
            }
        }
        Ok(entries)
    }

    /// Add `name -> ino` to `dir`. `dir` is updated in place and persisted if
    /// a block had to be added.
    ///
    /// The caller holds `dir`'s inode lock and passed a fresh copy of it.
    pub fn dir_insert(&self, dir: &mut DInode, name: &str, ino: u32) -> Result<()> {
        check_name(name)?;
        if !dir.is_dir() {
            return Err(FsError::NotADirectory);
        }

        // one pass: reject a duplicate anywhere, remember the first free slot
        let mut first_free: Option<(Buffer, usize)> = None;
        for (_, dno) in dir.blocks() {
            let bp = self.bread_data(dno)?;
            let mut free_slot = None;
            for slot in 0..DPB {
                let de = get_slot(&bp, slot)?;
                if de.matches(name) {
                    return Err(FsError::AlreadyExists);
                }
                if !de.valid && free_slot.is_none() {
                    free_slot = Some(slot);
                }
            }
            if first_free.is_none() {
                first_free = free_slot.map(|slot| (bp, slot));
            }
        }

        let entry = DirEnt::new(name, ino);
        let (mut bp, slot) = match first_free {
            Some(found) => found,
            None => (self.dir_grow(dir)?, 0),
        };
        put_slot(&mut bp, slot, &entry);
        bp.bwrite(self.dev())?;
        debug!("dir {}: +{:?} -> {}", dir.ino, name, ino);
        Ok(())
    }

    /// Attach a new, all-free block to `dir` and persist the inode.
    fn dir_grow(&self, dir: &mut DInode) -> Result<Buffer> {
        let idx = dir
            .addrs
            .iter()
            .position(|&p| p == NULL_PTR)
            .ok_or(FsError::DirectoryFull)?;
        let dno = self.balloc()?;
        let mut bp = self.data_buffer(dno)?;
        init_block(&mut bp);

        let mut grown = dir.clone();
        grown.addrs[idx] = dno;
        grown.size += BSIZE as u64;
        grown.touch();
        let persisted = bp.bwrite(self.dev()).and_then(|_| self.writei(&grown));
        if let Err(e) = persisted {
            if let Err(free_err) = self.bfree(dno) {
                warn!("dir {}: leaking block {}: {}", dir.ino, dno, free_err);
            }
            return Err(e);
        }
        *dir = grown;
        Ok(bp)
    }

    /// Clear the slot holding `name`. Absent names are not an error.
    ///
    /// Neither the child nor a block left empty is reclaimed here; see
    /// [`FileSystem::dir_compact`].
    pub fn dir_remove(&self, dir: &DInode, name: &str) -> Result<Option<DirEnt>> {
        if !dir.is_dir() {
            return Err(FsError::NotADirectory);
        }
        for (_, dno) in dir.blocks() {
            let mut bp = self.bread_data(dno)?;
            for slot in 0..DPB {
                let de = get_slot(&bp, slot)?;
                if de.matches(name) {
                    put_slot(&mut bp, slot, &DirEnt::free());
                    bp.bwrite(self.dev())?;
                    debug!("dir {}: -{:?}", dir.ino, name);
                    return Ok(Some(de));
                }
            }
        }
        Ok(None)
    }

    /// Give back every block of `dir` except the first that holds no valid
    /// entry. Pointers are cleared and persisted before the blocks are freed.
    pub fn dir_compact(&self, dir: &mut DInode) -> Result<usize> {
        let mut empty = Vec::new();
        for (idx, dno) in dir.blocks().skip(1) {
            let bp = self.bread_data(dno)?;
            let mut all_free = true;
            for slot in 0..DPB {
                if get_slot(&bp, slot)?.valid {
                    all_free = false;
                    break;
                }
            }
            if all_free {
                empty.push((idx, dno));
            }
        }
        if empty.is_empty() {
            return Ok(0);
        }

        for &(idx, _) in &empty {
            dir.addrs[idx] = NULL_PTR;
            dir.size -= BSIZE as u64;
        }
        self.writei(dir)?;
        for &(_, dno) in &empty {
            self.bfree(dno)?;
        }
        debug!("dir {}: released {} empty blocks", dir.ino, empty.len());
        Ok(empty.len())
    }
}
