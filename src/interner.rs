/// Shared string pool for LivePivot
///
/// STRING cells and string filter terms are stored as integer IDs into a
/// pool owned by the table. Staging tables, the store and view configs all
/// intern into the same pool, so an ID stays meaningful across them.
///
/// Every `intern` or `add_ref` must be balanced by a `release`. A slot whose
/// count drops to zero is recycled by the next new string.
///
/// # Examples
///
/// ```
/// use livepivot::StringInterner;
///
/// let mut pool = StringInterner::new();
/// let a = pool.intern("AAPL");
/// let b = pool.intern("AAPL");
///
/// assert_eq!(a, b);
/// assert_eq!(pool.ref_count(a), 2);
/// assert_eq!(pool.resolve(a), Some("AAPL"));
/// ```

use std::collections::HashMap;

/// Interned string ID type
pub type StringId = u32;

#[derive(Debug, Clone, Default)]
pub struct StringInterner {
    lookup: HashMap<String, StringId>,
    strings: Vec<String>,
    ref_counts: Vec<u32>,
    /// Slots released down to zero references
    free_ids: Vec<StringId>,
}

impl StringInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ID for `s`, taking one reference on it.
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.lookup.get(s) {
            self.ref_counts[id as usize] += 1;
            return id;
        }

        let id = match self.free_ids.pop() {
            Some(free) => {
                self.strings[free as usize] = s.to_string();
                self.ref_counts[free as usize] = 1;
                free
            }
            None => {
                self.strings.push(s.to_string());
                self.ref_counts.push(1);
                (self.strings.len() - 1) as StringId
            }
        };

        self.lookup.insert(s.to_string(), id);
        id
    }

    pub fn add_ref(&mut self, id: StringId) {
        if let Some(count) = self.ref_counts.get_mut(id as usize) {
            if *count > 0 {
                *count += 1;
            }
        }
    }

    pub fn release(&mut self, id: StringId) {
        let idx = id as usize;
        let Some(count) = self.ref_counts.get_mut(idx) else {
            return;
        };
        if *count == 0 {
            return;
        }
        *count -= 1;
        if *count == 0 {
            self.lookup.remove(&self.strings[idx]);
            self.free_ids.push(id);
        }
    }

    /// Resolves a live ID. Released IDs resolve to `None`.
    pub fn resolve(&self, id: StringId) -> Option<&str> {
        match self.ref_counts.get(id as usize) {
            Some(&count) if count > 0 => Some(self.strings[id as usize].as_str()),
            _ => None,
        }
    }

    /// Looks up a string without taking a reference.
    pub fn get(&self, s: &str) -> Option<StringId> {
        self.lookup.get(s).copied()
    }

    pub fn ref_count(&self, id: StringId) -> u32 {
        self.ref_counts.get(id as usize).copied().unwrap_or(0)
    }

    /// Number of distinct live strings.
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_dedupes() {
        let mut pool = StringInterner::new();

        let a = pool.intern("north");
        let b = pool.intern("south");
        let c = pool.intern("north");

        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get("south"), Some(b));
        assert_eq!(pool.get("east"), None);
    }

    #[test]
    fn test_release_frees_slot() {
        let mut pool = StringInterner::new();

        let id = pool.intern("north");
        pool.add_ref(id);
        assert_eq!(pool.ref_count(id), 2);

        pool.release(id);
        assert_eq!(pool.resolve(id), Some("north"));

        pool.release(id);
        assert_eq!(pool.resolve(id), None);
        assert!(pool.is_empty());

        // Extra releases are ignored
        pool.release(id);
        assert_eq!(pool.ref_count(id), 0);
    }

    #[test]
    fn test_released_slot_is_reused() {
        let mut pool = StringInterner::new();

        let first = pool.intern("first");
        let _second = pool.intern("second");
        pool.release(first);

        let third = pool.intern("third");
        assert_eq!(third, first);
        assert_eq!(pool.resolve(third), Some("third"));
        assert_eq!(pool.get("first"), None);
    }

    #[test]
    fn test_add_ref_on_dead_id_is_noop() {
        let mut pool = StringInterner::new();
        let id = pool.intern("x");
        pool.release(id);
        pool.add_ref(id);
        assert_eq!(pool.ref_count(id), 0);
    }

    #[test]
    fn test_empty_string() {
        let mut pool = StringInterner::new();
        let id = pool.intern("");
        assert_eq!(pool.resolve(id), Some(""));
    }
}
