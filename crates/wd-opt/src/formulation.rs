//! Formulations: ordered segment pipelines and the apply/reset transaction.

use serde::{Deserialize, Serialize};
use wd_engine::HydraulicEngine;
use wd_sim::WaterDistributionSystem;

use crate::error::{OptError, OptResult};
use crate::options::OptionTables;
use crate::segment::{Progress, Segment, TransactionContext, TransactionState};
use crate::segments::{
    ExistingPipes, NewPipes, PumpSchedule, TanksProportioned, TanksSimple, TanksSized,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistingPipesLayout {
    None,
    #[default]
    Paired,
    Combined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TanksLayout {
    #[default]
    None,
    Simple,
    Sized,
    Proportioned,
}

/// Which segments a problem uses. Segments appear in the vector in field order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulationSwitches {
    pub existing_pipes: ExistingPipesLayout,
    pub new_pipes: bool,
    pub pumps: bool,
    pub tanks: TanksLayout,
}

impl Default for FormulationSwitches {
    fn default() -> Self {
        Self {
            existing_pipes: ExistingPipesLayout::Paired,
            new_pipes: true,
            pumps: true,
            tanks: TanksLayout::None,
        }
    }
}

/// A fixed ordered pipeline of segments.
pub struct Formulation<E: HydraulicEngine> {
    segments: Vec<Box<dyn Segment<E>>>,
}

impl<E: HydraulicEngine> std::fmt::Debug for Formulation<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.segments.iter().map(|s| s.name()))
            .finish()
    }
}

impl<E: HydraulicEngine> Formulation<E> {
    pub fn new(segments: Vec<Box<dyn Segment<E>>>) -> Self {
        Self { segments }
    }

    pub fn from_switches(switches: &FormulationSwitches, tables: &OptionTables) -> Self {
        let mut segments: Vec<Box<dyn Segment<E>>> = Vec::new();
        match switches.existing_pipes {
            ExistingPipesLayout::None => {}
            ExistingPipesLayout::Paired => {
                segments.push(Box::new(ExistingPipes::paired(tables.clone())));
            }
            ExistingPipesLayout::Combined => {
                segments.push(Box::new(ExistingPipes::combined(tables.clone())));
            }
        }
        if switches.new_pipes {
            segments.push(Box::new(NewPipes {
                tables: tables.clone(),
            }));
        }
        if switches.pumps {
            segments.push(Box::new(PumpSchedule::default()));
        }
        match switches.tanks {
            TanksLayout::None => {}
            TanksLayout::Simple => segments.push(Box::new(TanksSimple {
                tables: tables.clone(),
            })),
            TanksLayout::Sized => segments.push(Box::new(TanksSized {
                tables: tables.clone(),
            })),
            TanksLayout::Proportioned => segments.push(Box::new(TanksProportioned {
                tables: tables.clone(),
            })),
        }
        Self::new(segments)
    }

    pub fn segment_names(&self) -> Vec<&'static str> {
        self.segments.iter().map(|s| s.name()).collect()
    }

    /// False for operations-only pipelines.
    pub fn has_design(&self) -> bool {
        self.segments.iter().any(|s| s.is_design())
    }

    /// Slots per segment, in pipeline order.
    fn lens(&self, wds: &WaterDistributionSystem<E>) -> OptResult<Vec<usize>> {
        self.segments.iter().map(|s| s.len(wds)).collect()
    }

    pub fn len(&self, wds: &WaterDistributionSystem<E>) -> OptResult<usize> {
        Ok(self.lens(wds)?.iter().sum())
    }

    /// Split `dv` into per-segment slices.
    fn split<'d>(
        &self,
        wds: &WaterDistributionSystem<E>,
        dv: &'d [f64],
    ) -> OptResult<Vec<&'d [f64]>> {
        let lens = self.lens(wds)?;
        let expected = lens.iter().sum();
        if dv.len() != expected {
            return Err(OptError::SizeMismatch {
                expected,
                got: dv.len(),
            });
        }
        let mut rest = dv;
        let mut parts = Vec::with_capacity(lens.len());
        for n in lens {
            let (head, tail) = rest.split_at(n);
            parts.push(head);
            rest = tail;
        }
        Ok(parts)
    }

    /// Lower and upper bounds in decision-vector order.
    pub fn bounds(&self, wds: &WaterDistributionSystem<E>) -> OptResult<(Vec<f64>, Vec<f64>)> {
        let mut lower = Vec::new();
        let mut upper = Vec::new();
        for segment in &self.segments {
            let (lo, up) = segment.bounds(wds)?;
            lower.extend(lo);
            upper.extend(up);
        }
        Ok((lower, upper))
    }

    pub fn continuous_mask(&self, wds: &WaterDistributionSystem<E>) -> OptResult<Vec<bool>> {
        let mut mask = Vec::new();
        for segment in &self.segments {
            mask.extend(segment.continuous_mask(wds)?);
        }
        Ok(mask)
    }

    /// Total capital cost; `dv` must be applied.
    pub fn capital_cost(&self, wds: &WaterDistributionSystem<E>, dv: &[f64]) -> OptResult<f64> {
        let parts = self.split(wds, dv)?;
        let mut total = 0.0;
        for (segment, part) in self.segments.iter().zip(parts) {
            total += segment.capital_cost(wds, part)?;
        }
        Ok(total)
    }

    /// Apply every segment in order.
    ///
    /// On error the network may be partly modified; `state` records how far
    /// apply got so [`Self::reset_dv`] undoes exactly that.
    pub fn apply_dv(
        &self,
        wds: &mut WaterDistributionSystem<E>,
        state: &mut TransactionState,
        dv: &[f64],
    ) -> OptResult<()> {
        let parts = self.split(wds, dv)?;
        let mut ctx = TransactionContext::new(wds, state);
        for (k, (segment, part)) in self.segments.iter().zip(parts).enumerate() {
            ctx.state.set_progress(Some(Progress {
                segment: k,
                slots: 0,
            }));
            segment.apply(ctx.for_segment(k, None), part).inspect_err(|e| {
                tracing::warn!(segment = segment.name(), error = %e, "apply_dv aborted");
            })?;
        }
        ctx.state.set_progress(None);
        Ok(())
    }

    /// Undo the segments in reverse order, each only as far as apply got.
    ///
    /// Every segment runs even after a failure; the first error is returned
    /// and `state` is cleared either way.
    pub fn reset_dv(
        &self,
        wds: &mut WaterDistributionSystem<E>,
        state: &mut TransactionState,
        dv: &[f64],
    ) -> OptResult<()> {
        let parts = match self.split(wds, dv) {
            Ok(parts) => parts,
            Err(e) => {
                state.clear();
                return Err(e);
            }
        };
        let progress = state.progress();
        let mut first = None;
        {
            let mut ctx = TransactionContext::new(wds, state);
            for (k, (segment, part)) in self.segments.iter().zip(parts).enumerate().rev() {
                let reached = match progress {
                    None => None,
                    Some(p) if k < p.segment => None,
                    Some(p) if k == p.segment => Some(p.slots),
                    Some(_) => continue,
                };
                if let Err(e) = segment.undo(ctx.for_segment(k, reached), part) {
                    tracing::error!(segment = segment.name(), error = %e, "reset_dv step failed");
                    first.get_or_insert(e);
                }
            }
        }
        state.clear();
        first.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wd_engine::MemoryEngine;

    #[test]
    fn switches_pick_segments_in_order() {
        let switches = FormulationSwitches {
            existing_pipes: ExistingPipesLayout::Combined,
            new_pipes: false,
            pumps: true,
            tanks: TanksLayout::Sized,
        };
        let f: Formulation<MemoryEngine> =
            Formulation::from_switches(&switches, &OptionTables::default());
        assert_eq!(
            f.segment_names(),
            vec!["existing_pipes_combined", "pump_schedule", "tanks_sized"]
        );
        assert!(f.has_design());
    }

    #[test]
    fn pumps_alone_are_operations_only() {
        let switches = FormulationSwitches {
            existing_pipes: ExistingPipesLayout::None,
            new_pipes: false,
            pumps: true,
            tanks: TanksLayout::None,
        };
        let f: Formulation<MemoryEngine> =
            Formulation::from_switches(&switches, &OptionTables::default());
        assert_eq!(f.segment_names(), vec!["pump_schedule"]);
        assert!(!f.has_design());
    }

    #[test]
    fn switches_parse_from_yaml() {
        let s: FormulationSwitches =
            serde_yaml::from_str("existing_pipes: none\ntanks: simple\n").unwrap();
        assert_eq!(s.existing_pipes, ExistingPipesLayout::None);
        assert_eq!(s.tanks, TanksLayout::Simple);
        assert!(s.new_pipes && s.pumps);
    }
}
