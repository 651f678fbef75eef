//! Daily pump group schedule.

use wd_engine::HydraulicEngine;
use wd_graph::RegistryView;
use wd_sim::WaterDistributionSystem;

use crate::error::{OptError, OptResult};
use crate::options::decode;
use crate::segment::{Segment, TransactionContext, check_len, keep_first};

pub const PERIODS_PER_DAY: usize = 24;

/// One slot per pattern period holding how many pumps run; pump `i` (in
/// registry order) runs in a period iff the slot value exceeds `i`.
#[derive(Debug, Clone)]
pub struct PumpSchedule {
    pub periods: usize,
}

impl Default for PumpSchedule {
    fn default() -> Self {
        Self {
            periods: PERIODS_PER_DAY,
        }
    }
}

/// `(pump id, speed pattern id)` of every permanent pump.
fn scheduled_pumps<E: HydraulicEngine>(
    wds: &WaterDistributionSystem<E>,
) -> OptResult<Vec<(String, String)>> {
    let net = wds.network();
    RegistryView::exclude(net.pumps(), wds.temp_elements())
        .ids()
        .map(|id| {
            let pattern = net.pump(id)?.speed_pattern.clone().ok_or_else(|| {
                OptError::settings(format!("pump '{id}' has no speed pattern to schedule"))
            })?;
            Ok((id.to_string(), pattern))
        })
        .collect()
}

/// Per-pump on/off multipliers for a group schedule: pump `i` runs in a
/// period iff more than `i` pumps are scheduled there.
pub fn decompose_group_schedule(running: &[usize], n_pumps: usize) -> Vec<Vec<f64>> {
    (0..n_pumps)
        .map(|i| {
            running
                .iter()
                .map(|&n| if n > i { 1.0 } else { 0.0 })
                .collect()
        })
        .collect()
}

/// Write a fixed group schedule onto the permanent pumps' speed patterns.
///
/// Used when the schedule is an input rather than part of the decision
/// vector, so the change is not undone.
pub fn set_group_operations<E: HydraulicEngine>(
    wds: &mut WaterDistributionSystem<E>,
    operations: &[f64],
) -> OptResult<()> {
    if operations.is_empty() {
        return Err(OptError::settings("pump group operations must not be empty"));
    }
    let pumps = scheduled_pumps(wds)?;
    let running = operations
        .iter()
        .map(|&v| decode(v, pumps.len() + 1, "running pumps"))
        .collect::<OptResult<Vec<_>>>()?;
    let patterns = decompose_group_schedule(&running, pumps.len());
    for ((id, pattern), multipliers) in pumps.iter().zip(patterns) {
        wds.set_pattern(pattern, &multipliers)?;
        tracing::debug!(pump = %id, pattern = %pattern, "fixed pump operations");
    }
    Ok(())
}

impl<E: HydraulicEngine> Segment<E> for PumpSchedule {
    fn name(&self) -> &'static str {
        "pump_schedule"
    }

    fn is_design(&self) -> bool {
        false
    }

    fn len(&self, _wds: &WaterDistributionSystem<E>) -> OptResult<usize> {
        Ok(self.periods)
    }

    fn bounds(&self, wds: &WaterDistributionSystem<E>) -> OptResult<(Vec<f64>, Vec<f64>)> {
        let n_pumps = scheduled_pumps(wds)?.len() as f64;
        Ok((vec![0.0; self.periods], vec![n_pumps; self.periods]))
    }

    fn apply(&self, ctx: &mut TransactionContext<'_, E>, dv: &[f64]) -> OptResult<()> {
        check_len(self.periods, dv)?;
        let pumps = scheduled_pumps(ctx.wds)?;
        let running = dv
            .iter()
            .map(|&v| decode(v, pumps.len() + 1, "running pumps"))
            .collect::<OptResult<Vec<_>>>()?;

        ctx.begin(0, self.periods);
        let patterns = decompose_group_schedule(&running, pumps.len());
        for ((id, pattern), multipliers) in pumps.iter().zip(patterns) {
            ctx.wds.set_pattern(pattern, &multipliers)?;
            tracing::trace!(pump = %id, pattern = %pattern, "pump schedule set");
        }
        Ok(())
    }

    fn undo(&self, ctx: &mut TransactionContext<'_, E>, dv: &[f64]) -> OptResult<()> {
        check_len(self.periods, dv)?;
        if !ctx.reached(0) {
            return Ok(());
        }
        let off = vec![0.0; self.periods];
        let mut first = None;
        for (_, pattern) in scheduled_pumps(ctx.wds)? {
            let result = ctx.wds.set_pattern(&pattern, &off).map_err(Into::into);
            keep_first(&mut first, result);
        }
        first.map_or(Ok(()), Err)
    }

    /// Pumps are already installed; their running cost is energy.
    fn capital_cost(&self, _wds: &WaterDistributionSystem<E>, dv: &[f64]) -> OptResult<f64> {
        check_len(self.periods, dv)?;
        Ok(0.0)
    }
}
