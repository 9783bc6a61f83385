//! LRU cache of solved paths.
//!
//! Entries live in a slab and are threaded into an index-linked list, head =
//! most recently used. The key index maps a 64-bit `path_key` to a slab slot.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::scheduler::Path;
use crate::math::Vec2;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Order-sensitive 64-bit FNV-1a over the little-endian bytes of
/// `a.x, a.y, b.x, b.y`.
///
/// Collisions are not resolved here; callers that care compare the stored
/// path's endpoints against the query.
pub fn path_key(a: Vec2, b: Vec2) -> u64 {
    let mut hash = FNV_OFFSET;
    for v in [a.x, a.y, b.x, b.y] {
        for byte in v.to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

const NIL: usize = usize::MAX;

struct Entry {
    key: u64,
    path: Path,
    prev: usize,
    next: usize,
}

struct Lru {
    capacity: usize,
    index: FxHashMap<u64, usize>,
    slots: Vec<Entry>,
    head: usize,
    tail: usize,
}

impl Lru {
    fn unlink(&mut self, i: usize) {
        let (prev, next) = (self.slots[i].prev, self.slots[i].next);
        if prev == NIL {
            self.head = next;
        } else {
            self.slots[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.slots[next].prev = prev;
        }
        self.slots[i].prev = NIL;
        self.slots[i].next = NIL;
    }

    fn push_front(&mut self, i: usize) {
        self.slots[i].prev = NIL;
        self.slots[i].next = self.head;
        if self.head != NIL {
            self.slots[self.head].prev = i;
        }
        self.head = i;
        if self.tail == NIL {
            self.tail = i;
        }
    }

    fn touch(&mut self, i: usize) {
        if self.head != i {
            self.unlink(i);
            self.push_front(i);
        }
    }

    fn get(&mut self, key: u64) -> Option<Path> {
        let i = *self.index.get(&key)?;
        self.touch(i);
        Some(Path::clone(&self.slots[i].path))
    }

    fn put(&mut self, key: u64, path: Path) {
        if let Some(&i) = self.index.get(&key) {
            self.slots[i].path = path;
            self.touch(i);
            return;
        }

        if self.slots.len() < self.capacity {
            let i = self.slots.len();
            self.slots.push(Entry { key, path, prev: NIL, next: NIL });
            self.index.insert(key, i);
            self.push_front(i);
            return;
        }

        // Full: recycle the least recently used slot.
        let victim = self.tail;
        self.unlink(victim);
        let old_key = self.slots[victim].key;
        self.index.remove(&old_key);
        self.slots[victim].key = key;
        self.slots[victim].path = path;
        self.index.insert(key, victim);
        self.push_front(victim);
    }
}

/// Fixed-capacity, thread-safe LRU of paths keyed by `path_key`.
///
/// Every hit and every put promotes the entry to most recently used. A
/// capacity of zero turns the cache into a no-op.
pub struct PathCache {
    inner: Mutex<Lru>,
}

impl PathCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Lru {
                capacity,
                index: FxHashMap::default(),
                slots: Vec::with_capacity(capacity.min(1 << 16)),
                head: NIL,
                tail: NIL,
            }),
        }
    }

    pub fn get(&self, key: u64) -> Option<Path> {
        self.inner.lock().get(key)
    }

    pub fn put(&self, key: u64, path: Path) {
        let mut lru = self.inner.lock();
        if lru.capacity == 0 {
            return;
        }
        lru.put(key, path);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Drop every entry, keeping the capacity.
    pub fn clear(&self) {
        let mut lru = self.inner.lock();
        lru.index.clear();
        lru.slots.clear();
        lru.head = NIL;
        lru.tail = NIL;
    }
}
