//! Arena of 32-bit-handle-indexed slots for Components and Buffers
//! (spec §9 Design note 1).
//!
//! The Buffer/Component cyclic back-references are expressed as
//! handles into an arena rather than raw pointers or `Rc`; a handle
//! stays valid for the arena's lifetime even after the slot it names
//! is freed and re-used would be unsafe, so freed slots are tombstoned
//! rather than compacted.

use std::fmt;
use std::marker::PhantomData;

/// An opaque handle into an [`Arena<T>`].
pub struct Handle<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// The raw arena index this handle names.
    pub fn index(self) -> u32 {
        self.index
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.index)
    }
}

/// Arena storing `T` values, addressed by [`Handle<T>`].
pub struct Arena<T> {
    slots: Vec<Option<T>>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn insert(&mut self, value: T) -> Handle<T> {
        let index = self.slots.len() as u32;
        self.slots.push(Some(value));
        Handle {
            index,
            _marker: PhantomData,
        }
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.slots.get(handle.index as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.slots.get_mut(handle.index as usize)?.as_mut()
    }

    /// Tombstones the slot, returning the value it held.
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        self.slots.get_mut(handle.index as usize)?.take()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.as_ref().map(|v| {
                (
                    Handle {
                        index: i as u32,
                        _marker: PhantomData,
                    },
                    v,
                )
            })
        })
    }

    /// Returns mutable references to every handle in `handles`
    /// simultaneously.
    ///
    /// This is the same aliasing trick a block-processing graph uses
    /// to hand a component simultaneous `&mut` access to distinct
    /// input/output buffers it owns: the debug assertion below is what
    /// makes the raw-pointer indexing sound, not a runtime condition
    /// callers are expected to recover from.
    ///
    /// # Panics
    /// Panics (debug builds) if `handles` contains a duplicate, or
    /// (all builds) if a handle resolves to a tombstoned slot.
    pub fn get_many_mut(&mut self, handles: &[Handle<T>]) -> Vec<&mut T> {
        debug_assert!(
            {
                let mut indices: Vec<u32> = handles.iter().map(|h| h.index).collect();
                indices.sort_unstable();
                indices.windows(2).all(|w| w[0] != w[1])
            },
            "Arena::get_many_mut called with duplicate handles"
        );
        let base = self.slots.as_mut_ptr();
        handles
            .iter()
            .map(|h| {
                // SAFETY: handles are pairwise distinct (checked above),
                // each index is in bounds because the caller only holds
                // handles this arena issued, and the resulting `&mut T`s
                // therefore never overlap.
                unsafe {
                    let slot = &mut *base.add(h.index as usize);
                    slot.as_mut().expect("Arena::get_many_mut handle resolves to an empty slot")
                }
            })
            .collect()
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get_round_trips() {
        let mut arena: Arena<i32> = Arena::new();
        let handle = arena.insert(42);
        assert_eq!(arena.get(handle), Some(&42));
    }

    #[test]
    fn remove_tombstones_without_shifting_other_handles() {
        let mut arena: Arena<i32> = Arena::new();
        let a = arena.insert(1);
        let b = arena.insert(2);
        arena.remove(a);
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.get(b), Some(&2));
    }

    #[test]
    fn get_many_mut_returns_independent_references() {
        let mut arena: Arena<i32> = Arena::new();
        let a = arena.insert(1);
        let b = arena.insert(2);
        let refs = arena.get_many_mut(&[a, b]);
        *refs[0] += 10;
        *refs[1] += 20;
        assert_eq!(arena.get(a), Some(&11));
        assert_eq!(arena.get(b), Some(&22));
    }

    #[test]
    #[should_panic(expected = "duplicate handles")]
    fn get_many_mut_rejects_duplicates() {
        let mut arena: Arena<i32> = Arena::new();
        let a = arena.insert(1);
        let _ = arena.get_many_mut(&[a, a]);
    }
}
