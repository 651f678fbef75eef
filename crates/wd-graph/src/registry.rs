//! Owning, ID-keyed element storage.

use std::collections::HashMap;

use wd_core::Key;

use crate::error::{GraphError, GraphResult};

#[derive(Debug, Clone)]
struct Entry<T> {
    id: String,
    value: T,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    entry: Option<Entry<T>>,
}

/// Sole owner of every element of one static kind.
///
/// - keys are unique textual IDs; `insert` refuses duplicates
/// - storage is a slot arena handing out generation-checked [`Key`]s, so a key
///   to an erased element never resolves again
/// - a separate insertion-order index gives stable iteration
#[derive(Debug, Clone)]
pub struct Registry<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    by_id: HashMap<String, Key<T>>,
    order: Vec<Key<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            by_id: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new element; fails with `DuplicateKey` if the ID is taken.
    pub fn insert(&mut self, id: impl Into<String>, value: T) -> GraphResult<Key<T>> {
        let id = id.into();
        if self.by_id.contains_key(&id) {
            return Err(GraphError::DuplicateKey { id });
        }

        let key = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(Entry {
                    id: id.clone(),
                    value,
                });
                Key::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(Entry {
                        id: id.clone(),
                        value,
                    }),
                });
                Key::new(index, 0)
            }
        };

        self.by_id.insert(id, key);
        self.order.push(key);
        Ok(key)
    }

    /// Remove and return the element, if present.
    pub fn take(&mut self, id: &str) -> Option<(Key<T>, T)> {
        let key = self.by_id.remove(id)?;
        let slot = &mut self.slots[key.index() as usize];
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index());
        self.order.retain(|k| *k != key);
        Some((key, entry.value))
    }

    /// Remove the element; returns how many were removed (0 or 1).
    pub fn erase(&mut self, id: &str) -> usize {
        usize::from(self.take(id).is_some())
    }

    pub fn find(&self, id: &str) -> Option<&T> {
        self.by_id.get(id).and_then(|&k| self.get(k))
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut T> {
        let key = *self.by_id.get(id)?;
        self.get_mut(key)
    }

    /// Like [`Self::find`] but a missing ID is an error.
    pub fn at(&self, id: &str) -> GraphResult<&T> {
        self.find(id).ok_or_else(|| GraphError::NotFound {
            id: id.to_string(),
            what: "element",
        })
    }

    pub fn at_mut(&mut self, id: &str) -> GraphResult<&mut T> {
        let key = self.key_of(id).ok_or_else(|| GraphError::NotFound {
            id: id.to_string(),
            what: "element",
        })?;
        self.get_mut(key).ok_or_else(|| GraphError::NotFound {
            id: id.to_string(),
            what: "element",
        })
    }

    pub fn key_of(&self, id: &str) -> Option<Key<T>> {
        self.by_id.get(id).copied()
    }

    pub fn get(&self, key: Key<T>) -> Option<&T> {
        let slot = self.slots.get(key.index() as usize)?;
        if slot.generation != key.generation() {
            return None;
        }
        slot.entry.as_ref().map(|e| &e.value)
    }

    pub fn get_mut(&mut self, key: Key<T>) -> Option<&mut T> {
        let slot = self.slots.get_mut(key.index() as usize)?;
        if slot.generation != key.generation() {
            return None;
        }
        slot.entry.as_mut().map(|e| &mut e.value)
    }

    /// The textual ID behind a key, if the key is still live.
    pub fn id_of(&self, key: Key<T>) -> Option<&str> {
        let slot = self.slots.get(key.index() as usize)?;
        if slot.generation != key.generation() {
            return None;
        }
        slot.entry.as_ref().map(|e| e.id.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn size(&self) -> usize {
        self.order.len()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterate `(id, element)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> + '_ {
        self.order.iter().filter_map(|&k| {
            self.slots[k.index() as usize]
                .entry
                .as_ref()
                .map(|e| (e.id.as_str(), &e.value))
        })
    }

    /// Iterate `(id, element)` mutably in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut T)> + '_ {
        let mut by_slot: Vec<Option<(&str, &mut T)>> = self
            .slots
            .iter_mut()
            .map(|slot| slot.entry.as_mut().map(|e| (e.id.as_str(), &mut e.value)))
            .collect();
        let ordered: Vec<(&str, &mut T)> = self
            .order
            .iter()
            .filter_map(|k| by_slot[k.index() as usize].take())
            .collect();
        ordered.into_iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.iter().map(|(id, _)| id)
    }

    pub fn keys(&self) -> impl Iterator<Item = Key<T>> + '_ {
        self.order.iter().copied()
    }
}
