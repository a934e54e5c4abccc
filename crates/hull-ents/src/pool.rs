//! Dense component storage with stable entity handles.

use hashbrown::HashMap;

use crate::EntityId;

/// One component type's storage: values packed in a dense vec, addressed
/// through an entity index. Removal swap-fills the hole with the tail value
/// and fixes the moved entity's back-reference, so iteration stays dense
/// and removal stays O(1).
pub struct Pool<T> {
    entities: Vec<EntityId>,
    values: Vec<T>,
    index: HashMap<EntityId, usize>,
}

impl<T> Pool<T> {
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            values: Vec::new(),
            index: HashMap::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn contains(&self, e: EntityId) -> bool {
        self.index.contains_key(&e)
    }

    /// Attach or replace the component for `e`.
    pub fn assign(&mut self, e: EntityId, value: T) {
        match self.index.get(&e) {
            Some(&slot) => self.values[slot] = value,
            None => {
                self.index.insert(e, self.values.len());
                self.entities.push(e);
                self.values.push(value);
            }
        }
    }

    #[inline]
    pub fn get(&self, e: EntityId) -> Option<&T> {
        self.index.get(&e).map(|&slot| &self.values[slot])
    }

    #[inline]
    pub fn get_mut(&mut self, e: EntityId) -> Option<&mut T> {
        match self.index.get(&e) {
            Some(&slot) => Some(&mut self.values[slot]),
            None => None,
        }
    }

    /// Detach and return `e`'s component. The tail value moves into the
    /// vacated slot; its owner's index entry is rewritten to match.
    pub fn remove(&mut self, e: EntityId) -> Option<T> {
        let slot = self.index.remove(&e)?;
        let last = self.values.len() - 1;
        self.entities.swap_remove(slot);
        let value = self.values.swap_remove(slot);
        if slot != last {
            let moved = self.entities[slot];
            self.index.insert(moved, slot);
        }
        Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.entities.iter().copied().zip(self.values.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.entities.iter().copied().zip(self.values.iter_mut())
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityAllocator;

    #[test]
    fn swap_remove_fixes_moved_entity_lookup() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        let c = alloc.allocate();
        let mut pool: Pool<i32> = Pool::new();
        pool.assign(a, 1);
        pool.assign(b, 2);
        pool.assign(c, 3);

        assert_eq!(pool.remove(a), Some(1));
        // c was the tail; it must still resolve after moving into a's slot.
        assert_eq!(pool.get(c), Some(&3));
        assert_eq!(pool.get(b), Some(&2));
        assert_eq!(pool.get(a), None);
        assert_eq!(pool.len(), 2);

        let seen: Vec<_> = pool.iter().map(|(e, &v)| (e, v)).collect();
        assert!(seen.contains(&(b, 2)) && seen.contains(&(c, 3)));
    }

    #[test]
    fn assign_twice_replaces_in_place() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        let mut pool: Pool<i32> = Pool::new();
        pool.assign(a, 1);
        pool.assign(a, 9);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(a), Some(&9));
    }

    #[test]
    fn remove_tail_is_clean() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        let mut pool: Pool<i32> = Pool::new();
        pool.assign(a, 1);
        pool.assign(b, 2);
        assert_eq!(pool.remove(b), Some(2));
        assert_eq!(pool.get(a), Some(&1));
        assert_eq!(pool.remove(b), None);
    }
}
