//! The optimizer-facing problem: fitness, bounds and integer count.

use std::path::Path;

use wd_engine::{HydraulicEngine, MemoryEngine};
use wd_graph::IdSequence;
use wd_sim::{HydraulicSettings, WaterDistributionSystem};

use crate::dv_adapter::DvAdapter;
use crate::error::{OptError, OptResult};
use crate::formulation::Formulation;
use crate::objectives::{self, ObjectiveSettings};
use crate::segment::TransactionState;
use crate::segments::set_group_operations;
use crate::settings::ProblemSettings;

/// Cost and reliability.
pub const N_OBJECTIVES: usize = 2;

/// One loaded network plus the formulation evaluated on it.
///
/// Decision vectors crossing [`Problem::fitness`], [`Problem::get_bounds`]
/// and [`Problem::save_solution`] are in optimizer layout (continuous slots
/// first); [`Problem::apply_dv`] and [`Problem::reset_dv`] take the
/// formulation layout.
#[derive(Debug)]
pub struct Problem<E: HydraulicEngine = MemoryEngine> {
    wds: WaterDistributionSystem<E>,
    formulation: Formulation<E>,
    hydraulics: HydraulicSettings,
    objectives: ObjectiveSettings,
    adapter: DvAdapter,
    bounds: (Vec<f64>, Vec<f64>),
    state: TransactionState,
}

impl<E: HydraulicEngine> Problem<E> {
    /// Load the network named by `settings`, attach its subnetworks and
    /// build the formulation.
    pub fn new(settings: &ProblemSettings) -> OptResult<Self> {
        settings.validate()?;
        let mut wds = WaterDistributionSystem::load(&settings.network)?;
        for (name, ids) in &settings.subnetworks {
            wds.insert_subnetwork(name, ids.iter().collect::<IdSequence>())?;
        }
        match (&settings.operations, settings.formulation.pumps) {
            (Some(operations), false) => set_group_operations(&mut wds, operations)?,
            (Some(_), true) => {
                tracing::warn!("pump group operations ignored: pumps are decision variables");
            }
            (None, _) => {}
        }
        let formulation = Formulation::from_switches(&settings.formulation, &settings.options);
        Self::from_parts(
            wds,
            formulation,
            settings.hydraulics.clone(),
            settings.objectives.clone(),
        )
    }

    pub fn from_parts(
        wds: WaterDistributionSystem<E>,
        formulation: Formulation<E>,
        hydraulics: HydraulicSettings,
        objectives: ObjectiveSettings,
    ) -> OptResult<Self> {
        hydraulics.validate()?;
        objectives.validate()?;
        let mask = formulation.continuous_mask(&wds)?;
        let (lower, upper) = formulation.bounds(&wds)?;
        if lower.len() != mask.len() || upper.len() != mask.len() {
            return Err(OptError::SizeMismatch {
                expected: mask.len(),
                got: lower.len(),
            });
        }
        let adapter = DvAdapter::new(&mask);
        let bounds = (
            adapter.to_optimizer_layout(&lower)?,
            adapter.to_optimizer_layout(&upper)?,
        );
        tracing::info!(
            segments = ?formulation.segment_names(),
            len = mask.len(),
            nix = adapter.nix(),
            "problem ready"
        );
        Ok(Self {
            wds,
            formulation,
            hydraulics,
            objectives,
            adapter,
            bounds,
            state: TransactionState::new(),
        })
    }

    pub fn wds(&self) -> &WaterDistributionSystem<E> {
        &self.wds
    }

    /// Give up the problem, keeping the network in its current state.
    pub fn into_wds(self) -> WaterDistributionSystem<E> {
        self.wds
    }

    pub fn formulation(&self) -> &Formulation<E> {
        &self.formulation
    }

    pub fn state(&self) -> &TransactionState {
        &self.state
    }

    pub fn dv_len(&self) -> usize {
        self.adapter.len()
    }

    /// Lower and upper bounds in optimizer layout.
    pub fn get_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        self.bounds.clone()
    }

    pub fn get_nix(&self) -> usize {
        self.adapter.nix()
    }

    pub fn nobj(&self) -> usize {
        N_OBJECTIVES
    }

    /// Apply a formulation-layout vector to the live network.
    pub fn apply_dv(&mut self, dv: &[f64]) -> OptResult<()> {
        self.formulation.apply_dv(&mut self.wds, &mut self.state, dv)
    }

    /// Undo [`Self::apply_dv`] with the same vector, including after a
    /// failed apply.
    pub fn reset_dv(&mut self, dv: &[f64]) -> OptResult<()> {
        self.formulation.reset_dv(&mut self.wds, &mut self.state, dv)
    }

    /// Evaluate both objectives. A design the engine cannot simulate scores
    /// `f64::MAX` everywhere; any other failure is returned.
    pub fn fitness(&mut self, dv: &[f64]) -> OptResult<Vec<f64>> {
        let dv = self.adapter.from_optimizer_layout(dv)?;
        let outcome = self.evaluate(&dv);
        let reset = self.reset_dv(&dv);
        let fitness = match outcome {
            Ok(Some(f)) => f,
            Ok(None) => vec![f64::MAX; N_OBJECTIVES],
            Err(e) if e.is_simulation_failure() => {
                tracing::warn!(error = %e, "candidate not simulable");
                vec![f64::MAX; N_OBJECTIVES]
            }
            Err(e) => {
                if let Err(r) = reset {
                    tracing::error!(error = %r, "reset after failed evaluation");
                }
                return Err(e);
            }
        };
        reset?;
        Ok(fitness)
    }

    /// Apply, simulate and score; `None` when the run did not complete.
    fn evaluate(&mut self, dv: &[f64]) -> OptResult<Option<Vec<f64>>> {
        self.apply_dv(dv)?;
        let run = self.wds.run_hydraulics(&self.hydraulics)?;
        if !run.is_successful_with_warnings() {
            if let Some((t, code)) = run.fatal() {
                tracing::debug!(t, code = %code, "hydraulic run failed");
            }
            return Ok(None);
        }
        let cost = if self.formulation.has_design() {
            let capital = self.formulation.capital_cost(&self.wds, dv)?;
            tracing::debug!(capital, "capital cost");
            objectives::cost(&self.wds, capital, &self.objectives)?
        } else {
            // Nothing is built: one day of pumping is the whole bill.
            objectives::energy_cost_per_day(&self.wds, self.objectives.energy_price)?
        };
        let reliability = objectives::reliability(&self.wds, &run, &self.objectives)?;
        tracing::debug!(cost, reliability, "candidate evaluated");
        Ok(Some(vec![cost, reliability]))
    }

    /// Write the network with `dv` applied, then restore it.
    pub fn save_solution(&mut self, dv: &[f64], path: &Path) -> OptResult<()> {
        let dv = self.adapter.from_optimizer_layout(dv)?;
        let saved = self
            .apply_dv(&dv)
            .and_then(|()| self.wds.save(path).map_err(OptError::from));
        let reset = self.reset_dv(&dv);
        saved?;
        reset
    }
}
