//! Storage for calculated cell values
//!
//! The calculation engine keeps its bookkeeping (compiled programs, dirty
//! flags) to itself but stores every computed value through a
//! [`CacheBackend`], so a host can bound or share the memory it uses. A
//! backend may drop entries at any time; a missing value is recomputed.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use ahash::AHashMap;

use crate::dependency::CellKey;
use crate::value::FormulaValue;

/// Key/value store for calculated values
///
/// One backend serves one engine; keys from two workbooks would collide.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &CellKey) -> Option<FormulaValue>;

    fn set(&self, key: CellKey, value: FormulaValue);

    fn delete(&self, key: &CellKey);

    fn clear(&self);
}

/// Unbounded in-memory backend, the default
#[derive(Default)]
pub struct MemoryCache {
    values: RwLock<AHashMap<CellKey, FormulaValue>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheBackend for MemoryCache {
    fn get(&self, key: &CellKey) -> Option<FormulaValue> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: CellKey, value: FormulaValue) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    fn delete(&self, key: &CellKey) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    fn clear(&self) {
        self.values.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCache").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_memory_cache() {
        let cache = MemoryCache::new();
        let a1 = CellKey::new(0, 0, 0);
        let b1 = CellKey::new(0, 0, 1);

        assert_eq!(cache.get(&a1), None);
        cache.set(a1, FormulaValue::Number(1.0));
        cache.set(b1, FormulaValue::from("x"));
        cache.set(a1, FormulaValue::Number(2.0));
        assert_eq!(cache.get(&a1), Some(FormulaValue::Number(2.0)));
        assert_eq!(cache.len(), 2);

        cache.delete(&a1);
        assert_eq!(cache.get(&a1), None);
        assert_eq!(cache.get(&b1), Some(FormulaValue::from("x")));

        cache.clear();
        assert!(cache.is_empty());
    }
}
