//! Ordered sets of element IDs ("subnetworks").

/// An ordered sequence of unique IDs.
///
/// Holds no elements; it may keep naming IDs whose elements were removed,
/// in which case lookups through it fail instead of dangling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdSequence {
    ids: Vec<String>,
}

impl IdSequence {
    pub const fn new() -> Self {
        Self { ids: Vec::new() }
    }

    /// Append an ID; returns false (and changes nothing) if already present.
    pub fn push_back(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Remove an ID; returns how many were removed (0 or 1).
    pub fn erase(&mut self, id: &str) -> usize {
        match self.position(id) {
            Some(pos) => {
                self.ids.remove(pos);
                1
            }
            None => 0,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|s| s == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|s| s == id)
    }

    pub fn get(&self, pos: usize) -> Option<&str> {
        self.ids.get(pos).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

impl<S: Into<String>> FromIterator<S> for IdSequence {
    /// Duplicates keep their first position.
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut seq = IdSequence::new();
        for id in iter {
            seq.push_back(id);
        }
        seq
    }
}
