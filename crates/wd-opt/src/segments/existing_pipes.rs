//! Rehabilitation of existing pipes: leave, clean, or duplicate.

use wd_core::LinkStatus;
use wd_engine::{HydraulicEngine, LinkProperty};
use wd_sim::WaterDistributionSystem;

use crate::error::{OptError, OptResult};
use crate::options::{CLEANED_ROUGHNESS, M_PER_FT, NEW_ROUGHNESS, OptionTables, decode};
use crate::segment::{
    Segment, TransactionContext, check_len, keep_first, subnetwork_pipes,
};

pub const EXISTING_PIPES: &str = "existing_pipes";
/// Pipes priced at city rates; every other existing pipe is residential.
pub const CITY_PIPES: &str = "city_pipes";

/// ID of the parallel pipe installed when `id` is duplicated.
pub fn duplicate_id(id: &str) -> String {
    format!("D{id}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Keep,
    Clean,
    /// Duplicate with the given existing-pipe option.
    Duplicate(usize),
}

/// How an existing pipe's decision is laid out in the vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeEncoding {
    /// Two slots per pipe: action (0 keep, 1 clean, 2 duplicate) and option.
    Paired,
    /// One slot per pipe: 0 keep, 1 clean, k >= 2 duplicate with option k - 2.
    Combined,
}

impl PipeEncoding {
    pub fn width(self) -> usize {
        match self {
            PipeEncoding::Paired => 2,
            PipeEncoding::Combined => 1,
        }
    }
}

/// Existing pipes of subnetwork [`EXISTING_PIPES`], in subnetwork order.
#[derive(Debug, Clone)]
pub struct ExistingPipes {
    pub encoding: PipeEncoding,
    pub tables: OptionTables,
}

impl ExistingPipes {
    pub fn paired(tables: OptionTables) -> Self {
        Self {
            encoding: PipeEncoding::Paired,
            tables,
        }
    }

    pub fn combined(tables: OptionTables) -> Self {
        Self {
            encoding: PipeEncoding::Combined,
            tables,
        }
    }

    fn width(&self) -> usize {
        self.encoding.width()
    }

    fn action(&self, dv: &[f64], item: usize) -> OptResult<Action> {
        let n_options = self.tables.existing_pipes.len();
        match self.encoding {
            PipeEncoding::Paired => {
                let slot = item * 2;
                let action = decode(dv[slot], 3, "existing pipe action")?;
                let option = decode(dv[slot + 1], n_options, "existing pipe option")?;
                Ok(match action {
                    0 => Action::Keep,
                    1 => Action::Clean,
                    _ => Action::Duplicate(option),
                })
            }
            PipeEncoding::Combined => {
                let code = decode(dv[item], 2 + n_options, "existing pipe action")?;
                Ok(match code {
                    0 => Action::Keep,
                    1 => Action::Clean,
                    k => Action::Duplicate(k - 2),
                })
            }
        }
    }

    fn upper_bounds(&self) -> Vec<f64> {
        let n_options = self.tables.existing_pipes.len() as f64;
        match self.encoding {
            PipeEncoding::Paired => vec![2.0, n_options - 1.0],
            PipeEncoding::Combined => vec![n_options + 1.0],
        }
    }
}

fn apply_action<E: HydraulicEngine>(
    ctx: &mut TransactionContext<'_, E>,
    tables: &OptionTables,
    id: &str,
    action: Action,
) -> OptResult<()> {
    match action {
        Action::Keep => Ok(()),
        Action::Clean => {
            let roughness = ctx.wds.network().pipe(id)?.roughness;
            ctx.state.capture(id, roughness);
            ctx.wds
                .set_link_property(id, LinkProperty::Roughness, CLEANED_ROUGHNESS)?;
            tracing::trace!(id, from = roughness, "pipe cleaned");
            Ok(())
        }
        Action::Duplicate(option) => {
            let option = tables.existing_pipes[option];
            let dup = duplicate_id(id);
            ctx.wds.duplicate(id, &dup)?;
            ctx.record_temp(&dup);
            ctx.wds
                .set_link_property(&dup, LinkProperty::InitStatus, LinkStatus::Open.as_value())?;
            ctx.wds
                .set_link_property(&dup, LinkProperty::Diameter, option.diameter_m())?;
            ctx.wds
                .set_link_property(&dup, LinkProperty::Roughness, NEW_ROUGHNESS)?;
            tracing::trace!(id, dup, diameter_in = option.diameter_in, "pipe duplicated");
            Ok(())
        }
    }
}

fn undo_action<E: HydraulicEngine>(
    ctx: &mut TransactionContext<'_, E>,
    id: &str,
    action: Action,
) -> OptResult<()> {
    match action {
        Action::Keep => Ok(()),
        Action::Clean => {
            let roughness = ctx.state.take_capture(id)?;
            ctx.wds
                .set_link_property(id, LinkProperty::Roughness, roughness)?;
            Ok(())
        }
        Action::Duplicate(_) => ctx.remove_temp(&duplicate_id(id)).map(|_| ()),
    }
}

fn action_cost<E: HydraulicEngine>(
    wds: &WaterDistributionSystem<E>,
    tables: &OptionTables,
    id: &str,
    action: Action,
) -> OptResult<f64> {
    let pipe = wds.network().pipe(id)?;
    let city = wds.id_sequence(CITY_PIPES).is_some_and(|s| s.contains(id));
    let per_ft = match action {
        Action::Keep => return Ok(0.0),
        Action::Clean => tables
            .existing_for_diameter(pipe.diameter)
            .ok_or_else(|| OptError::Unpriced {
                id: id.to_string(),
                what: "cleaning",
            })?
            .clean_per_ft(city),
        Action::Duplicate(option) => tables.existing_pipes[option].duplicate_per_ft(city),
    };
    Ok(per_ft / M_PER_FT * pipe.length)
}

impl<E: HydraulicEngine> Segment<E> for ExistingPipes {
    fn name(&self) -> &'static str {
        match self.encoding {
            PipeEncoding::Paired => "existing_pipes_paired",
            PipeEncoding::Combined => "existing_pipes_combined",
        }
    }

    fn len(&self, wds: &WaterDistributionSystem<E>) -> OptResult<usize> {
        Ok(subnetwork_pipes(wds, EXISTING_PIPES)?.len() * self.width())
    }

    fn bounds(&self, wds: &WaterDistributionSystem<E>) -> OptResult<(Vec<f64>, Vec<f64>)> {
        let n = subnetwork_pipes(wds, EXISTING_PIPES)?.len();
        Ok((vec![0.0; n * self.width()], self.upper_bounds().repeat(n)))
    }

    fn apply(&self, ctx: &mut TransactionContext<'_, E>, dv: &[f64]) -> OptResult<()> {
        let ids = subnetwork_pipes(ctx.wds, EXISTING_PIPES)?;
        check_len(ids.len() * self.width(), dv)?;
        for (item, id) in ids.iter().enumerate() {
            let action = self.action(dv, item)?;
            ctx.begin(item * self.width(), self.width());
            apply_action(ctx, &self.tables, id, action)?;
        }
        Ok(())
    }

    fn undo(&self, ctx: &mut TransactionContext<'_, E>, dv: &[f64]) -> OptResult<()> {
        let ids = subnetwork_pipes(ctx.wds, EXISTING_PIPES)?;
        check_len(ids.len() * self.width(), dv)?;
        let mut first = None;
        for (item, id) in ids.iter().enumerate().rev() {
            if !ctx.reached(item * self.width()) {
                continue;
            }
            let result = self
                .action(dv, item)
                .and_then(|action| undo_action(ctx, id, action));
            keep_first(&mut first, result);
        }
        first.map_or(Ok(()), Err)
    }

    fn capital_cost(&self, wds: &WaterDistributionSystem<E>, dv: &[f64]) -> OptResult<f64> {
        let ids = subnetwork_pipes(wds, EXISTING_PIPES)?;
        check_len(ids.len() * self.width(), dv)?;
        let mut total = 0.0;
        for (item, id) in ids.iter().enumerate() {
            total += action_cost(wds, &self.tables, id, self.action(dv, item)?)?;
        }
        Ok(total)
    }
}
