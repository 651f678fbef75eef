//! Reordering between the formulation layout and the optimizer layout.
//!
//! Mixed-integer optimizers want continuous slots first and integer slots
//! after. Relative order inside each group is preserved.

use crate::error::{OptError, OptResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DvAdapter {
    /// `to_optimizer[i]` is the formulation slot placed at optimizer slot `i`.
    to_optimizer: Vec<usize>,
    /// `from_optimizer[j]` is the optimizer slot holding formulation slot `j`.
    from_optimizer: Vec<usize>,
    n_continuous: usize,
}

impl DvAdapter {
    pub fn new(continuous: &[bool]) -> Self {
        let to_optimizer: Vec<usize> = (0..continuous.len())
            .filter(|&i| continuous[i])
            .chain((0..continuous.len()).filter(|&i| !continuous[i]))
            .collect();
        let mut from_optimizer = vec![0; to_optimizer.len()];
        for (position, &slot) in to_optimizer.iter().enumerate() {
            from_optimizer[slot] = position;
        }
        Self {
            n_continuous: continuous.iter().filter(|&&c| c).count(),
            to_optimizer,
            from_optimizer,
        }
    }

    pub fn len(&self) -> usize {
        self.to_optimizer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_optimizer.is_empty()
    }

    /// Number of integer slots.
    pub fn nix(&self) -> usize {
        self.len() - self.n_continuous
    }

    pub fn to_optimizer_layout(&self, dv: &[f64]) -> OptResult<Vec<f64>> {
        reorder(&self.to_optimizer, dv)
    }

    pub fn from_optimizer_layout(&self, dv: &[f64]) -> OptResult<Vec<f64>> {
        reorder(&self.from_optimizer, dv)
    }
}

fn reorder(permutation: &[usize], dv: &[f64]) -> OptResult<Vec<f64>> {
    if dv.len() != permutation.len() {
        return Err(OptError::SizeMismatch {
            expected: permutation.len(),
            got: dv.len(),
        });
    }
    Ok(permutation.iter().map(|&i| dv[i]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn continuous_slots_move_first() {
        let adapter = DvAdapter::new(&[false, true, false, true]);
        let opt = adapter.to_optimizer_layout(&[0.0, 1.5, 2.0, 3.5]).unwrap();
        assert_eq!(opt, vec![1.5, 3.5, 0.0, 2.0]);
        assert_eq!(adapter.nix(), 2);
        assert_eq!(
            adapter.from_optimizer_layout(&opt).unwrap(),
            vec![0.0, 1.5, 2.0, 3.5]
        );
    }

    #[test]
    fn wrong_length_is_rejected() {
        let adapter = DvAdapter::new(&[true, false]);
        assert!(matches!(
            adapter.from_optimizer_layout(&[1.0]),
            Err(OptError::SizeMismatch {
                expected: 2,
                got: 1
            })
        ));
    }

    proptest! {
        #[test]
        fn layouts_invert_each_other(
            slots in prop::collection::vec((any::<bool>(), -1e6f64..1e6), 0..40)
        ) {
            let mask: Vec<bool> = slots.iter().map(|s| s.0).collect();
            let dv: Vec<f64> = slots.iter().map(|s| s.1).collect();
            let adapter = DvAdapter::new(&mask);
            let opt = adapter.to_optimizer_layout(&dv).unwrap();
            prop_assert_eq!(adapter.from_optimizer_layout(&opt).unwrap(), dv);
            let n_cont = mask.iter().filter(|&&c| c).count();
            prop_assert_eq!(adapter.nix(), mask.len() - n_cont);
        }
    }
}
