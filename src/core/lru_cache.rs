// Copyright @yucwang 2026

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Opaque cache key. Zero is reserved to mean "no entry".
pub type CacheKey = u64;

const NIL: usize = usize::MAX;

/// Self-reported resident size, used for cache budget accounting.
pub trait ByteCount {
    fn bytes(&self) -> usize;
}

struct Slot<T> {
    key: CacheKey,
    data: Arc<T>,
    bytes: usize,
    prev: usize,
    next: usize,
}

struct Inner<T> {
    max_bytes: usize,
    byte_count: usize,
    next_key: CacheKey,
    map: HashMap<CacheKey, usize>,
    slots: Vec<Option<Slot<T>>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    oversize_logged: bool,
}

impl<T> Inner<T> {
    fn unlink(&mut self, index: usize) {
        let (prev, next) = {
            let slot = self.slots[index].as_ref().unwrap();
            (slot.prev, slot.next)
        };
        if prev != NIL {
            self.slots[prev].as_mut().unwrap().next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.slots[next].as_mut().unwrap().prev = prev;
        } else {
            self.tail = prev;
        }
    }

    fn link_front(&mut self, index: usize) {
        let old_head = self.head;
        {
            let slot = self.slots[index].as_mut().unwrap();
            slot.prev = NIL;
            slot.next = old_head;
        }
        if old_head != NIL {
            self.slots[old_head].as_mut().unwrap().prev = index;
        } else {
            self.tail = index;
        }
        self.head = index;
    }

    fn evict_tail(&mut self) -> bool {
        if self.tail == NIL {
            return false;
        }
        let index = self.tail;
        self.unlink(index);
        let slot = self.slots[index].take().unwrap();
        self.map.remove(&slot.key);
        self.byte_count -= slot.bytes;
        self.free.push(index);
        true
    }
}

/// A thread-safe least-recently-used cache over shared handles.
///
/// The cache holds one `Arc` per entry; eviction drops that reference, so
/// a caller that fetched a handle keeps its data alive for as long as it
/// wants. A missing key is not an error, the caller regenerates and
/// re-inserts.
pub struct LruCache<T> {
    inner: Mutex<Inner<T>>,
}

impl<T: ByteCount> LruCache<T> {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                max_bytes,
                byte_count: 0,
                next_key: 1,
                map: HashMap::new(),
                slots: Vec::new(),
                free: Vec::new(),
                head: NIL,
                tail: NIL,
                oversize_logged: false,
            }),
        }
    }

    /// Sets the byte budget. Intended to be called once, right after
    /// construction; existing entries are not re-evaluated.
    pub fn set_max_size(&self, max_bytes: usize) {
        let mut inner = self.lock();
        inner.max_bytes = max_bytes;
    }

    /// Inserts an entry at the front of the usage order, evicting from the
    /// back until the budget holds, and returns its fresh non-zero key.
    /// A single entry larger than the whole budget is admitted on its own.
    pub fn put(&self, data: Arc<T>) -> CacheKey {
        let bytes = data.bytes();
        let mut inner = self.lock();

        while inner.byte_count + bytes > inner.max_bytes {
            if !inner.evict_tail() {
                break;
            }
        }

        if bytes > inner.max_bytes && !inner.oversize_logged {
            inner.oversize_logged = true;
            log::warn!(
                "cache entry of {} bytes exceeds the whole cache budget of {} bytes",
                bytes,
                inner.max_bytes
            );
        }

        let mut key = inner.next_key;
        while key == 0 || inner.map.contains_key(&key) {
            key = key.wrapping_add(1);
        }
        inner.next_key = key.wrapping_add(1);

        let slot = Slot { key, data, bytes, prev: NIL, next: NIL };
        let index = match inner.free.pop() {
            Some(index) => {
                inner.slots[index] = Some(slot);
                index
            }
            None => {
                inner.slots.push(Some(slot));
                inner.slots.len() - 1
            }
        };
        inner.link_front(index);
        inner.map.insert(key, index);
        inner.byte_count += bytes;

        key
    }

    /// Fetches and promotes an entry. Returns None when the key has been
    /// evicted (or was never issued); the zero key is always absent.
    pub fn get(&self, key: CacheKey) -> Option<Arc<T>> {
        if key == 0 {
            return None;
        }
        let mut inner = self.lock();
        let index = *inner.map.get(&key)?;
        inner.unlink(index);
        inner.link_front(index);
        Some(inner.slots[index].as_ref().unwrap().data.clone())
    }

    pub fn byte_count(&self) -> usize {
        self.lock().byte_count
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<T>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/* Tests for the LRU cache */

#[cfg(test)]
mod tests {
    use super::*;

    struct Blob {
        size: usize,
        tag: u32,
    }

    impl ByteCount for Blob {
        fn bytes(&self) -> usize {
            self.size
        }
    }

    fn blob(size: usize, tag: u32) -> Arc<Blob> {
        Arc::new(Blob { size, tag })
    }

    #[test]
    fn test_put_then_get_returns_same_handle() {
        let cache = LruCache::new(100);
        let data = blob(10, 1);
        let key = cache.put(data.clone());

        assert_ne!(key, 0);
        let fetched = cache.get(key).expect("entry should be resident");
        assert!(Arc::ptr_eq(&fetched, &data));
    }

    #[test]
    fn test_budget_evicts_oldest() {
        let cache = LruCache::new(100);
        let mut keys = Vec::new();
        for i in 0..11 {
            keys.push(cache.put(blob(10, i)));
        }

        assert!(cache.byte_count() <= 100);
        assert!(cache.get(keys[0]).is_none());
        for key in &keys[1..] {
            assert!(cache.get(*key).is_some());
        }
    }

    #[test]
    fn test_get_promotes_entry() {
        let cache = LruCache::new(30);
        let a = cache.put(blob(10, 0));
        let b = cache.put(blob(10, 1));
        let c = cache.put(blob(10, 2));

        // Touch the oldest, then force one eviction; the untouched middle
        // entry should be the one to go.
        assert!(cache.get(a).is_some());
        let d = cache.put(blob(10, 3));

        assert!(cache.get(b).is_none());
        assert!(cache.get(a).is_some());
        assert!(cache.get(c).is_some());
        assert!(cache.get(d).is_some());
    }

    #[test]
    fn test_handle_outlives_eviction() {
        let cache = LruCache::new(10);
        let data = blob(10, 42);
        let key = cache.put(data.clone());

        // This insert evicts the first entry entirely.
        let _ = cache.put(blob(10, 43));
        assert!(cache.get(key).is_none());

        // The external holder still owns live data.
        assert_eq!(data.tag, 42);
    }

    #[test]
    fn test_single_oversized_entry_is_sole_resident() {
        let cache = LruCache::new(100);
        let _ = cache.put(blob(10, 0));
        let _ = cache.put(blob(10, 1));
        let big = cache.put(blob(250, 2));

        assert_eq!(cache.len(), 1);
        assert!(cache.get(big).is_some());
    }

    #[test]
    fn test_zero_key_is_always_absent() {
        let cache: LruCache<Blob> = LruCache::new(100);
        assert!(cache.get(0).is_none());
    }
}
