use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::num::NonZeroU32;

/// Generation-checked handle into a registry slot.
///
/// - the slot is stored as `index + 1` so `Option<Key<T>>` stays the size of `Key<T>`
/// - the generation changes every time the slot is reused, so a key to an
///   erased element never resolves to whatever replaced it
/// - `T` only brands the key; it is never stored
pub struct Key<T> {
    slot: NonZeroU32,
    generation: u32,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    /// Create a key from a 0-based slot index and the slot's generation.
    pub fn new(index: u32, generation: u32) -> Self {
        let slot = NonZeroU32::new(index.saturating_add(1)).unwrap_or(NonZeroU32::MAX);
        Self {
            slot,
            generation,
            _kind: PhantomData,
        }
    }

    /// Recover the 0-based slot index.
    pub fn index(self) -> u32 {
        self.slot.get() - 1
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

// Manual impls: derives would put bounds on `T`.
impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

impl<T> PartialEq for Key<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot && self.generation == other.generation
    }
}

impl<T> Eq for Key<T> {}

impl<T> Hash for Key<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.slot.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({}v{})", self.index(), self.generation)
    }
}

impl<T> fmt::Display for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;

    #[test]
    fn key_round_trip_index() {
        for i in [0_u32, 1, 2, 42, 10_000] {
            let key = Key::<Marker>::new(i, 3);
            assert_eq!(key.index(), i);
            assert_eq!(key.generation(), 3);
        }
    }

    #[test]
    fn generation_distinguishes_reused_slot() {
        let old = Key::<Marker>::new(5, 0);
        let new = Key::<Marker>::new(5, 1);
        assert_ne!(old, new);
    }

    #[test]
    fn option_key_is_small() {
        assert_eq!(
            core::mem::size_of::<Key<Marker>>(),
            core::mem::size_of::<Option<Key<Marker>>>()
        );
    }
}
