//! Non-owning filtered and ordered windows over a [`Registry`].
//!
//! Membership is tested against the bound [`IdSequence`] on every traversal,
//! so a view always reflects the live registry. Both borrows are held for the
//! view's lifetime: neither side can change underneath it.

use crate::error::{GraphError, GraphResult};
use crate::registry::Registry;
use crate::sequence::IdSequence;

#[derive(Debug, Clone, Copy)]
pub enum ViewMode<'s> {
    /// Every element, registry order.
    All,
    /// Elements whose ID is in the sequence, registry order.
    Include(&'s IdSequence),
    /// Elements whose ID is not in the sequence, registry order.
    Exclude(&'s IdSequence),
    /// Elements whose ID is in the sequence, sequence order.
    OrderedInclude(&'s IdSequence),
}

impl ViewMode<'_> {
    pub fn admits(&self, id: &str) -> bool {
        match self {
            ViewMode::All => true,
            ViewMode::Include(seq) | ViewMode::OrderedInclude(seq) => seq.contains(id),
            ViewMode::Exclude(seq) => !seq.contains(id),
        }
    }
}

/// Every ID of an ordered sequence must be present, otherwise the sequence and
/// the registry have drifted apart.
fn check_ordered<T>(registry: &Registry<T>, name: &str, seq: &IdSequence) -> GraphResult<()> {
    match seq.iter().find(|id| !registry.contains(id)) {
        Some(id) => Err(GraphError::Desynchronized {
            id: id.to_string(),
            sequence: name.to_string(),
        }),
        None => Ok(()),
    }
}

/// Read-only view.
#[derive(Debug, Clone, Copy)]
pub struct RegistryView<'a, T> {
    registry: &'a Registry<T>,
    mode: ViewMode<'a>,
}

impl<'a, T: 'a> RegistryView<'a, T> {
    pub fn all(registry: &'a Registry<T>) -> Self {
        Self {
            registry,
            mode: ViewMode::All,
        }
    }

    pub fn include(registry: &'a Registry<T>, seq: &'a IdSequence) -> Self {
        Self {
            registry,
            mode: ViewMode::Include(seq),
        }
    }

    pub fn exclude(registry: &'a Registry<T>, seq: &'a IdSequence) -> Self {
        Self {
            registry,
            mode: ViewMode::Exclude(seq),
        }
    }

    /// Ordered view; fails with `Desynchronized` if `seq` names a missing ID.
    pub fn ordered(registry: &'a Registry<T>, name: &str, seq: &'a IdSequence) -> GraphResult<Self> {
        check_ordered(registry, name, seq)?;
        Ok(Self {
            registry,
            mode: ViewMode::OrderedInclude(seq),
        })
    }

    pub fn mode(&self) -> ViewMode<'a> {
        self.mode
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = (&'a str, &'a T)> + 'a> {
        let registry = self.registry;
        match self.mode {
            ViewMode::All => Box::new(registry.iter()),
            ViewMode::OrderedInclude(seq) => Box::new(
                seq.iter()
                    .filter_map(move |id| registry.find(id).map(|value| (id, value))),
            ),
            mode => Box::new(registry.iter().filter(move |(id, _)| mode.admits(id))),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.iter().map(|(id, _)| id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.registry.contains(id) && self.mode.admits(id)
    }

    pub fn len(&self) -> usize {
        match self.mode {
            ViewMode::All => self.registry.len(),
            _ => self.iter().count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read-write view.
#[derive(Debug)]
pub struct RegistryViewMut<'a, T> {
    registry: &'a mut Registry<T>,
    mode: ViewMode<'a>,
}

impl<'a, T> RegistryViewMut<'a, T> {
    pub fn all(registry: &'a mut Registry<T>) -> Self {
        Self {
            registry,
            mode: ViewMode::All,
        }
    }

    pub fn include(registry: &'a mut Registry<T>, seq: &'a IdSequence) -> Self {
        Self {
            registry,
            mode: ViewMode::Include(seq),
        }
    }

    pub fn exclude(registry: &'a mut Registry<T>, seq: &'a IdSequence) -> Self {
        Self {
            registry,
            mode: ViewMode::Exclude(seq),
        }
    }

    pub fn ordered(
        registry: &'a mut Registry<T>,
        name: &str,
        seq: &'a IdSequence,
    ) -> GraphResult<Self> {
        check_ordered(registry, name, seq)?;
        Ok(Self {
            registry,
            mode: ViewMode::OrderedInclude(seq),
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut T)> + '_ {
        let mode = self.mode;
        let mut picked: Vec<(&str, &mut T)> = self
            .registry
            .iter_mut()
            .filter(|(id, _)| mode.admits(id))
            .collect();
        if let ViewMode::OrderedInclude(seq) = mode {
            picked.sort_by_key(|(id, _)| seq.position(id));
        }
        picked.into_iter()
    }
}
