use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::errors::{PrismError, Result};

/// A tag-keyed container of polymorphic implementations.
///
/// Device kernels cannot dispatch virtually, so implementations are
/// registered under small integer tags at pipeline-build time; the tags
/// are stored in geometry instance records and the integrator dispatches
/// through [`dispatch`](Self::dispatch), the host-side analog of the
/// tag-keyed switch expanded at kernel compile time. Registration can be
/// keyed to deduplicate instances built from the same scene node.
pub struct Polymorphic<T: ?Sized> {
    name: &'static str,
    capacity: usize,
    impls: Vec<Arc<T>>,
    keys: FxHashMap<usize, u32>,
}

impl<T: ?Sized> Polymorphic<T> {
    #[must_use]
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity,
            impls: Vec::new(),
            keys: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.impls.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.impls.is_empty()
    }

    /// The tag previously assigned to `key`, if any.
    #[must_use]
    pub fn tag_for(&self, key: usize) -> Option<u32> {
        self.keys.get(&key).copied()
    }

    /// Registers an implementation under a fresh tag, remembered by
    /// `key` for deduplication.
    pub fn insert(&mut self, key: usize, implementation: Arc<T>) -> Result<u32> {
        if let Some(&tag) = self.keys.get(&key) {
            return Ok(tag);
        }
        let tag = self.push(implementation)?;
        self.keys.insert(key, tag);
        Ok(tag)
    }

    /// Registers an implementation under a fresh tag with no key.
    pub fn push(&mut self, implementation: Arc<T>) -> Result<u32> {
        if self.impls.len() >= self.capacity {
            return Err(PrismError::ResourceExhausted(format!(
                "too many {} implementations (capacity {})",
                self.name, self.capacity
            )));
        }
        self.impls.push(implementation);
        Ok(self.impls.len() as u32 - 1)
    }

    /// The implementation registered under `tag`.
    #[must_use]
    pub fn get(&self, tag: u32) -> &T {
        &self.impls[tag as usize]
    }

    /// Dispatches on a tag, the way the generated kernel switch does.
    pub fn dispatch<R>(&self, tag: u32, f: impl FnOnce(&T) -> R) -> R {
        f(self.get(tag))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.impls.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_insert_deduplicates() {
        let mut container: Polymorphic<str> = Polymorphic::new("test", 8);
        let a = container.insert(1, Arc::from("a")).unwrap();
        let b = container.insert(2, Arc::from("b")).unwrap();
        let a2 = container.insert(1, Arc::from("ignored")).unwrap();
        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(container.len(), 2);
        assert_eq!(container.dispatch(b, |s| s.to_string()), "b");
    }

    #[test]
    fn capacity_is_enforced() {
        let mut container: Polymorphic<str> = Polymorphic::new("test", 1);
        container.push(Arc::from("a")).unwrap();
        assert!(container.push(Arc::from("b")).is_err());
    }
}
