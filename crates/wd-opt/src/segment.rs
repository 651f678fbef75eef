//! Decision-vector segments and the state shared by one apply/reset pair.

use std::collections::BTreeMap;

use wd_core::LinkType;
use wd_engine::HydraulicEngine;
use wd_sim::WaterDistributionSystem;

use crate::error::{OptError, OptResult};

/// Values captured during `apply_dv`, consumed by the matching `reset_dv`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionState {
    captures: BTreeMap<String, f64>,
    progress: Option<Progress>,
}

/// How far an aborted apply got: segment index and slots started in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Progress {
    pub segment: usize,
    pub slots: usize,
}

impl TransactionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the prior value of `id`. A second capture for the same ID
    /// keeps the first value: segments are expected to be disjoint.
    pub fn capture(&mut self, id: &str, value: f64) {
        if let Some(&kept) = self.captures.get(id) {
            tracing::warn!(id, kept, ignored = value, "element captured twice in one transaction");
            return;
        }
        self.captures.insert(id.to_string(), value);
    }

    pub fn captured(&self, id: &str) -> Option<f64> {
        self.captures.get(id).copied()
    }

    pub fn take_capture(&mut self, id: &str) -> OptResult<f64> {
        self.captures
            .remove(id)
            .ok_or_else(|| OptError::MissingCapture { id: id.to_string() })
    }

    pub fn is_clean(&self) -> bool {
        self.captures.is_empty() && self.progress.is_none()
    }

    pub(crate) fn progress(&self) -> Option<Progress> {
        self.progress
    }

    pub(crate) fn set_progress(&mut self, progress: Option<Progress>) {
        self.progress = progress;
    }

    pub(crate) fn clear(&mut self) {
        self.captures.clear();
        self.progress = None;
    }
}

/// Mutable view handed to one segment.
pub struct TransactionContext<'a, E: HydraulicEngine> {
    pub wds: &'a mut WaterDistributionSystem<E>,
    pub state: &'a mut TransactionState,
    /// Slots of this segment an aborted apply started; `None` for all.
    reached: Option<usize>,
    /// Segment position in the pipeline, for progress tracking.
    segment: usize,
}

impl<'a, E: HydraulicEngine> TransactionContext<'a, E> {
    pub fn new(wds: &'a mut WaterDistributionSystem<E>, state: &'a mut TransactionState) -> Self {
        Self {
            wds,
            state,
            reached: None,
            segment: 0,
        }
    }

    pub(crate) fn for_segment(&mut self, segment: usize, reached: Option<usize>) -> &mut Self {
        self.segment = segment;
        self.reached = reached;
        self
    }

    /// Mark the item starting at `slot` (with `width` slots) as attempted.
    pub fn begin(&mut self, slot: usize, width: usize) {
        self.state.set_progress(Some(Progress {
            segment: self.segment,
            slots: slot + width,
        }));
    }

    /// Whether apply reached the item starting at `slot`.
    pub fn reached(&self, slot: usize) -> bool {
        self.reached.is_none_or(|n| slot < n)
    }

    /// Record a structural addition in the temporary-elements sequence.
    pub fn record_temp(&mut self, id: &str) {
        self.wds.temp_elements_mut().push_back(id);
    }

    /// Remove a temporary element if apply installed it; absent IDs are a no-op.
    pub fn remove_temp(&mut self, id: &str) -> OptResult<bool> {
        if !self.wds.temp_elements().contains(id) {
            return Ok(false);
        }
        self.wds.remove(id)?;
        self.wds.temp_elements_mut().erase(id);
        Ok(true)
    }
}

/// One fixed-size block of the decision vector.
///
/// Segments hold configuration only. Everything an evaluation changes lives in
/// the network or in [`TransactionState`], so `undo` can run after a failed
/// `apply` and on a segment that was never applied.
pub trait Segment<E: HydraulicEngine> {
    fn name(&self) -> &'static str;

    /// Whether the segment changes the built design; operations-only
    /// segments are priced by energy alone.
    fn is_design(&self) -> bool {
        true
    }

    /// Slots this segment takes for the loaded network.
    fn len(&self, wds: &WaterDistributionSystem<E>) -> OptResult<usize>;

    fn bounds(&self, wds: &WaterDistributionSystem<E>) -> OptResult<(Vec<f64>, Vec<f64>)>;

    /// Per-slot "is continuous" flags; integer everywhere by default.
    fn continuous_mask(&self, wds: &WaterDistributionSystem<E>) -> OptResult<Vec<bool>> {
        Ok(vec![false; self.len(wds)?])
    }

    fn apply(&self, ctx: &mut TransactionContext<'_, E>, dv: &[f64]) -> OptResult<()>;

    /// Restore what `apply` changed. Visits every reached item and reports
    /// the first failure once done.
    fn undo(&self, ctx: &mut TransactionContext<'_, E>, dv: &[f64]) -> OptResult<()>;

    /// Capital cost of the design in `dv`; called while `dv` is applied.
    fn capital_cost(&self, wds: &WaterDistributionSystem<E>, dv: &[f64]) -> OptResult<f64>;
}

/// Ordered IDs of the pipes of a subnetwork.
pub(crate) fn subnetwork_pipes<E: HydraulicEngine>(
    wds: &WaterDistributionSystem<E>,
    name: &str,
) -> OptResult<Vec<String>> {
    Ok(wds
        .subnetwork_links(name, LinkType::Pipe)?
        .ids()
        .map(str::to_string)
        .collect())
}

/// Keep the first error while still running every step.
pub(crate) fn keep_first(first: &mut Option<OptError>, result: OptResult<()>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "undo step failed");
        first.get_or_insert(e);
    }
}

pub(crate) fn check_len(expected: usize, dv: &[f64]) -> OptResult<()> {
    if dv.len() != expected {
        return Err(OptError::SizeMismatch {
            expected,
            got: dv.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_capture_wins() {
        let mut state = TransactionState::new();
        state.capture("7", 70.0);
        state.capture("7", 125.0);
        assert_eq!(state.captured("7"), Some(70.0));
        assert_eq!(state.take_capture("7").unwrap(), 70.0);
        assert!(matches!(
            state.take_capture("7"),
            Err(OptError::MissingCapture { .. })
        ));
        assert!(state.is_clean());
    }

    #[test]
    fn keep_first_error() {
        let mut first = None;
        keep_first(&mut first, Ok(()));
        keep_first(&mut first, Err(OptError::MissingCapture { id: "a".into() }));
        keep_first(&mut first, Err(OptError::MissingCapture { id: "b".into() }));
        assert!(matches!(first, Some(OptError::MissingCapture { id }) if id == "a"));
    }
}
