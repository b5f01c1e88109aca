use std::sync::{Arc, Condvar, Mutex, PoisonError, Weak};

struct Slot {
    held: Mutex<bool>,
    cv: Condvar,
}

/// Exclusive hold on one inode, released on drop.
pub struct InodeGuard {
    ino: u32,
    slot: Arc<Slot>,
}

impl InodeGuard {
    pub fn ino(&self) -> u32 {
        self.ino
    }
}

impl Drop for InodeGuard {
    fn drop(&mut self) {
        *super::lock(&self.slot.held) = false;
        self.slot.cv.notify_one();
    }
}

/// Hands out one lock per inode number.
///
/// Locks are created on demand and dropped once nobody holds or waits for
/// them. Callers that need two locks take the parent directory's before the
/// child's.
pub struct InodeLockManager(Mutex<Vec<(u32 /* ino */, Weak<Slot>)>>);

impl InodeLockManager {
    pub fn new() -> Self {
        Self(Mutex::new(Vec::new()))
    }

    fn slot(&self, ino: u32) -> Arc<Slot> {
        let mut table = super::lock(&self.0);
        table.retain(|pair| pair.1.strong_count() > 0); // remove dead weak references

        if let Some(slot) = table.iter().find(|pair| pair.0 == ino).and_then(|pair| pair.1.upgrade()) {
            slot
        } else {
            let slot = Arc::new(Slot {
                held: Mutex::new(false),
                cv: Condvar::new(),
            });
            table.push((ino, Arc::downgrade(&slot)));
            slot
        }
    }

    /// Block until `ino` is free, then hold it.
    pub fn lock(&self, ino: u32) -> InodeGuard {
        let slot = self.slot(ino);
        {
            let mut held = super::lock(&slot.held);
            while *held {
                held = slot.cv.wait(held).unwrap_or_else(PoisonError::into_inner);
            }
            *held = true;
        }
        InodeGuard { ino, slot }
    }

    #[cfg(test)]
    fn live(&self) -> usize {
        super::lock(&self.0).len()
    }
}

impl Default for InodeLockManager {
    fn default() -> Self {
        Self::new()
    }
}
