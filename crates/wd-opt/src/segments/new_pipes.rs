//! Sizing of candidate new pipes.
//!
//! Candidates exist in the network with a vanishing diameter; applying an
//! option gives them a real one, undo shrinks them back.

use wd_engine::{HydraulicEngine, LinkProperty};
use wd_sim::WaterDistributionSystem;

use crate::error::OptResult;
use crate::options::{M_PER_FT, NONEXISTING_DIAMETER_FT, OptionTables, decode};
use crate::segment::{Segment, TransactionContext, check_len, keep_first, subnetwork_pipes};

pub const NEW_PIPES: &str = "new_pipes";

/// One slot per pipe of [`NEW_PIPES`]: index into the new-pipe options.
#[derive(Debug, Clone)]
pub struct NewPipes {
    pub tables: OptionTables,
}

impl NewPipes {
    fn option(&self, dv: &[f64], item: usize) -> OptResult<usize> {
        decode(dv[item], self.tables.new_pipes.len(), "new pipe option")
    }
}

impl<E: HydraulicEngine> Segment<E> for NewPipes {
    fn name(&self) -> &'static str {
        "new_pipes"
    }

    fn len(&self, wds: &WaterDistributionSystem<E>) -> OptResult<usize> {
        Ok(subnetwork_pipes(wds, NEW_PIPES)?.len())
    }

    fn bounds(&self, wds: &WaterDistributionSystem<E>) -> OptResult<(Vec<f64>, Vec<f64>)> {
        let n = subnetwork_pipes(wds, NEW_PIPES)?.len();
        let top = self.tables.new_pipes.len() as f64 - 1.0;
        Ok((vec![0.0; n], vec![top; n]))
    }

    fn apply(&self, ctx: &mut TransactionContext<'_, E>, dv: &[f64]) -> OptResult<()> {
        let ids = subnetwork_pipes(ctx.wds, NEW_PIPES)?;
        check_len(ids.len(), dv)?;
        for (item, id) in ids.iter().enumerate() {
            let option = self.tables.new_pipes[self.option(dv, item)?];
            ctx.begin(item, 1);
            ctx.wds
                .set_link_property(id, LinkProperty::Diameter, option.diameter_m())?;
            tracing::trace!(id, diameter_in = option.diameter_in, "new pipe sized");
        }
        Ok(())
    }

    fn undo(&self, ctx: &mut TransactionContext<'_, E>, dv: &[f64]) -> OptResult<()> {
        let ids = subnetwork_pipes(ctx.wds, NEW_PIPES)?;
        check_len(ids.len(), dv)?;
        let mut first = None;
        for (item, id) in ids.iter().enumerate().rev() {
            if !ctx.reached(item) {
                continue;
            }
            let result = ctx
                .wds
                .set_link_property(
                    id,
                    LinkProperty::Diameter,
                    NONEXISTING_DIAMETER_FT * M_PER_FT,
                )
                .map_err(Into::into);
            keep_first(&mut first, result);
        }
        first.map_or(Ok(()), Err)
    }

    fn capital_cost(&self, wds: &WaterDistributionSystem<E>, dv: &[f64]) -> OptResult<f64> {
        let ids = subnetwork_pipes(wds, NEW_PIPES)?;
        check_len(ids.len(), dv)?;
        let mut total = 0.0;
        for (item, id) in ids.iter().enumerate() {
            let option = self.tables.new_pipes[self.option(dv, item)?];
            total += option.cost_per_ft / M_PER_FT * wds.network().pipe(id)?.length;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_are_range_checked() {
        let seg = NewPipes {
            tables: OptionTables::default(),
        };
        assert_eq!(seg.option(&[9.0], 0).unwrap(), 9);
        assert!(seg.option(&[10.0], 0).is_err());
    }
}
