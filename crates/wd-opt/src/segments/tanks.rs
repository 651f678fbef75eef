//! Temporary tanks, each fed by a riser pipe from a candidate junction.
//!
//! Tank slot `i` installs tank `T{i}` and riser `Ris_{i}` (junction to tank)
//! and records both as temporary elements. A slot whose location is already
//! taken by an earlier slot does nothing, on apply and on undo.

use std::collections::HashSet;

use wd_core::{LinkStatus, NodeType, ensure_finite};
use wd_engine::HydraulicEngine;
use wd_graph::{LinkKind, Node, NodeKind, Pipe, RegistryView, Tank};
use wd_sim::WaterDistributionSystem;

use crate::error::{OptError, OptResult};
use crate::options::{
    H2D_RATIO_MIN, H2D_RATIO_STEP, H2D_RATIO_STEPS, M_PER_FT, M_PER_IN, M3_PER_GAL,
    MAX_INSTALLABLE_TANKS, NEW_ROUGHNESS, OptionTables, RISER_LENGTH_FT, SIMPLE_RISER_DIAMETER_IN,
    decode,
};
use crate::segment::{Segment, TransactionContext, check_len, keep_first};

pub const POSSIBLE_TANK_LOCATIONS: &str = "possible_tank_locations";

pub const TANK_DIAMETER_BOUNDS_M: (f64, f64) = (25.0 * M_PER_FT, 100.0 * M_PER_FT);
pub const TANK_HMAX_BOUNDS_M: (f64, f64) = (200.0 * M_PER_FT, 250.0 * M_PER_FT);
pub const TANK_HMIN_BOUNDS_M: (f64, f64) = (180.0 * M_PER_FT, 240.0 * M_PER_FT);
pub const TANK_SAFETY_BOUNDS_M: (f64, f64) = (0.0, 25.0 * M_PER_FT);

pub fn tank_id(slot: usize) -> String {
    format!("T{slot}")
}

pub fn riser_id(slot: usize) -> String {
    format!("Ris_{slot}")
}

fn locations<E: HydraulicEngine>(wds: &WaterDistributionSystem<E>) -> OptResult<Vec<String>> {
    Ok(wds
        .subnetwork_nodes(POSSIBLE_TANK_LOCATIONS, NodeType::Junction)?
        .ids()
        .map(str::to_string)
        .collect())
}

fn install<E: HydraulicEngine>(
    ctx: &mut TransactionContext<'_, E>,
    slot: usize,
    junction: &str,
    elevation: f64,
    tank: Tank,
    riser_diameter: f64,
) -> OptResult<()> {
    let tank_id = tank_id(slot);
    let riser_id = riser_id(slot);
    ctx.wds
        .insert_node(&tank_id, Node::new(elevation, NodeKind::Tank(tank)))?;
    ctx.record_temp(&tank_id);
    let riser = Pipe {
        length: RISER_LENGTH_FT * M_PER_FT,
        diameter: riser_diameter,
        roughness: NEW_ROUGHNESS,
    };
    ctx.wds.install_link(
        &riser_id,
        junction,
        &tank_id,
        LinkStatus::Open,
        LinkKind::Pipe(riser),
    )?;
    ctx.record_temp(&riser_id);
    tracing::debug!(tank = %tank_id, junction, elevation, "tank installed");
    Ok(())
}

/// Take out tank `slot` and its riser if they were installed.
fn uninstall<E: HydraulicEngine>(ctx: &mut TransactionContext<'_, E>, slot: usize) -> OptResult<()> {
    // Removing the tank removes the riser with it.
    ctx.remove_temp(&tank_id(slot))?;
    ctx.wds.temp_elements_mut().erase(&riser_id(slot));
    Ok(())
}

fn undo_all<E: HydraulicEngine>(ctx: &mut TransactionContext<'_, E>, width: usize) -> OptResult<()> {
    let mut first = None;
    for slot in (0..MAX_INSTALLABLE_TANKS).rev() {
        if ctx.reached(slot * width) {
            keep_first(&mut first, uninstall(ctx, slot));
        }
    }
    first.map_or(Ok(()), Err)
}

fn installed<E: HydraulicEngine>(wds: &WaterDistributionSystem<E>, slot: usize) -> bool {
    wds.temp_elements().contains(&tank_id(slot))
}

/// Two slots per tank: location (0 none, k the k-th candidate) and volume
/// option. The tank is a cylinder with height equal to its diameter and
/// copies elevation and minimum level from the first permanent tank.
#[derive(Debug, Clone)]
pub struct TanksSimple {
    pub tables: OptionTables,
}

impl TanksSimple {
    const WIDTH: usize = 2;

    /// `(location code, volume option)` of a slot.
    fn decode_slot(&self, dv: &[f64], slot: usize, n_locations: usize) -> OptResult<(usize, usize)> {
        let base = slot * Self::WIDTH;
        let location = decode(dv[base], n_locations + 1, "tank location")?;
        let volume = decode(dv[base + 1], self.tables.tanks.len(), "tank volume option")?;
        Ok((location, volume))
    }
}

impl<E: HydraulicEngine> Segment<E> for TanksSimple {
    fn name(&self) -> &'static str {
        "tanks_simple"
    }

    fn len(&self, _wds: &WaterDistributionSystem<E>) -> OptResult<usize> {
        Ok(MAX_INSTALLABLE_TANKS * Self::WIDTH)
    }

    fn bounds(&self, wds: &WaterDistributionSystem<E>) -> OptResult<(Vec<f64>, Vec<f64>)> {
        let n_locations = locations(wds)?.len() as f64;
        let n_volumes = self.tables.tanks.len() as f64;
        let upper = [n_locations, n_volumes - 1.0].repeat(MAX_INSTALLABLE_TANKS);
        Ok((vec![0.0; upper.len()], upper))
    }

    fn apply(&self, ctx: &mut TransactionContext<'_, E>, dv: &[f64]) -> OptResult<()> {
        check_len(MAX_INSTALLABLE_TANKS * Self::WIDTH, dv)?;
        let candidates = locations(ctx.wds)?;
        let mut taken = HashSet::new();
        for slot in 0..MAX_INSTALLABLE_TANKS {
            let (location, volume) = self.decode_slot(dv, slot, candidates.len())?;
            if location == 0 || taken.contains(&location) {
                continue;
            }
            ctx.begin(slot * Self::WIDTH, Self::WIDTH);

            let net = ctx.wds.network();
            let reference = RegistryView::exclude(net.tanks(), ctx.wds.temp_elements())
                .ids()
                .next()
                .ok_or_else(|| OptError::settings("no permanent tank to copy levels from"))?;
            let elevation = net.node(reference)?.elevation;
            let reference = net.tank(reference)?;

            let volume_m3 = self.tables.tanks[volume].volume_m3();
            // Cylinder with h = d: V = pi d^3 / 4.
            let diameter = (4.0 * volume_m3 / std::f64::consts::PI).cbrt();
            let tank = Tank {
                initial_level: reference.min_level,
                min_level: reference.min_level,
                max_level: diameter,
                diameter,
                min_volume: reference.min_volume,
            };
            let riser_diameter = SIMPLE_RISER_DIAMETER_IN * M_PER_IN;
            install(ctx, slot, &candidates[location - 1], elevation, tank, riser_diameter)?;
            taken.insert(location);
        }
        Ok(())
    }

    fn undo(&self, ctx: &mut TransactionContext<'_, E>, dv: &[f64]) -> OptResult<()> {
        check_len(MAX_INSTALLABLE_TANKS * Self::WIDTH, dv)?;
        undo_all(ctx, Self::WIDTH)
    }

    fn capital_cost(&self, wds: &WaterDistributionSystem<E>, dv: &[f64]) -> OptResult<f64> {
        check_len(MAX_INSTALLABLE_TANKS * Self::WIDTH, dv)?;
        let n_locations = locations(wds)?.len();
        let riser = self
            .tables
            .new_pipe_for_diameter(SIMPLE_RISER_DIAMETER_IN)
            .ok_or_else(|| OptError::Unpriced {
                id: riser_id(0),
                what: "riser diameter",
            })?;
        let mut total = 0.0;
        for slot in 0..MAX_INSTALLABLE_TANKS {
            if !installed(wds, slot) {
                continue;
            }
            let (_, volume) = self.decode_slot(dv, slot, n_locations)?;
            total += self.tables.tanks[volume].cost + riser.cost_per_ft * RISER_LENGTH_FT;
        }
        Ok(total)
    }
}

/// Six slots per tank: riser option (0 none, k the (k-1)-th new-pipe option),
/// location index, then diameter, overflow head, minimum head and safety
/// level in metres.
#[derive(Debug, Clone)]
pub struct TanksSized {
    pub tables: OptionTables,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SizedTank {
    riser: usize,
    location: usize,
    diameter: f64,
    hmax: f64,
    hmin: f64,
    safety: f64,
}

impl SizedTank {
    fn elevation(&self) -> f64 {
        self.hmin - self.safety
    }

    fn tank(&self) -> Tank {
        let mut operational = self.hmax - self.hmin;
        // The hmax and hmin ranges overlap; fall back to the top of the hmax range.
        if operational < 0.0 {
            operational = TANK_HMAX_BOUNDS_M.1 - self.hmin;
        }
        Tank {
            initial_level: self.safety,
            min_level: self.safety,
            max_level: operational + self.safety,
            diameter: self.diameter,
            min_volume: std::f64::consts::PI * self.diameter * self.diameter / 4.0 * self.safety,
        }
    }
}

impl TanksSized {
    const WIDTH: usize = 6;

    fn decode_slot(&self, dv: &[f64], slot: usize, n_locations: usize) -> OptResult<SizedTank> {
        let s = &dv[slot * Self::WIDTH..(slot + 1) * Self::WIDTH];
        Ok(SizedTank {
            riser: decode(s[0], self.tables.new_pipes.len() + 1, "riser option")?,
            location: decode(s[1], n_locations, "tank location")?,
            diameter: ensure_finite(s[2], "tank diameter")?,
            hmax: ensure_finite(s[3], "tank overflow head")?,
            hmin: ensure_finite(s[4], "tank minimum head")?,
            safety: ensure_finite(s[5], "tank safety level")?,
        })
    }
}

impl<E: HydraulicEngine> Segment<E> for TanksSized {
    fn name(&self) -> &'static str {
        "tanks_sized"
    }

    fn len(&self, _wds: &WaterDistributionSystem<E>) -> OptResult<usize> {
        Ok(MAX_INSTALLABLE_TANKS * Self::WIDTH)
    }

    fn bounds(&self, wds: &WaterDistributionSystem<E>) -> OptResult<(Vec<f64>, Vec<f64>)> {
        let n_locations = locations(wds)?.len() as f64;
        let n_risers = self.tables.new_pipes.len() as f64;
        let lower = [
            0.0,
            0.0,
            TANK_DIAMETER_BOUNDS_M.0,
            TANK_HMAX_BOUNDS_M.0,
            TANK_HMIN_BOUNDS_M.0,
            TANK_SAFETY_BOUNDS_M.0,
        ];
        let upper = [
            n_risers,
            n_locations - 1.0,
            TANK_DIAMETER_BOUNDS_M.1,
            TANK_HMAX_BOUNDS_M.1,
            TANK_HMIN_BOUNDS_M.1,
            TANK_SAFETY_BOUNDS_M.1,
        ];
        Ok((
            lower.repeat(MAX_INSTALLABLE_TANKS),
            upper.repeat(MAX_INSTALLABLE_TANKS),
        ))
    }

    fn continuous_mask(&self, _wds: &WaterDistributionSystem<E>) -> OptResult<Vec<bool>> {
        Ok([false, false, true, true, true, true].repeat(MAX_INSTALLABLE_TANKS))
    }

    fn apply(&self, ctx: &mut TransactionContext<'_, E>, dv: &[f64]) -> OptResult<()> {
        check_len(MAX_INSTALLABLE_TANKS * Self::WIDTH, dv)?;
        let candidates = locations(ctx.wds)?;
        let mut taken = HashSet::new();
        for slot in 0..MAX_INSTALLABLE_TANKS {
            let design = self.decode_slot(dv, slot, candidates.len())?;
            if design.riser == 0 || taken.contains(&design.location) {
                continue;
            }
            ctx.begin(slot * Self::WIDTH, Self::WIDTH);
            let riser_diameter = self.tables.new_pipes[design.riser - 1].diameter_m();
            install(
                ctx,
                slot,
                &candidates[design.location],
                design.elevation(),
                design.tank(),
                riser_diameter,
            )?;
            taken.insert(design.location);
        }
        Ok(())
    }

    fn undo(&self, ctx: &mut TransactionContext<'_, E>, dv: &[f64]) -> OptResult<()> {
        check_len(MAX_INSTALLABLE_TANKS * Self::WIDTH, dv)?;
        undo_all(ctx, Self::WIDTH)
    }

    fn capital_cost(&self, wds: &WaterDistributionSystem<E>, dv: &[f64]) -> OptResult<f64> {
        check_len(MAX_INSTALLABLE_TANKS * Self::WIDTH, dv)?;
        let n_locations = locations(wds)?.len();
        let mut total = 0.0;
        for slot in 0..MAX_INSTALLABLE_TANKS {
            if !installed(wds, slot) {
                continue;
            }
            let design = self.decode_slot(dv, slot, n_locations)?;
            let volume_gal = wds.network().tank(&tank_id(slot))?.max_volume() / M3_PER_GAL;
            let riser = self.tables.new_pipes[design.riser - 1];
            total += self.tables.tank_cost(volume_gal) + riser.cost_per_ft * RISER_LENGTH_FT;
        }
        Ok(total)
    }
}

/// Four slots per tank: location (0 none, k the k-th candidate), volume
/// option, riser option and height-to-diameter step.
///
/// The tank sits one riser length above its junction and works between the
/// fixed operating heads of the option tables. A tank whose shell does not
/// contain that band is not built but is still charged, like a slot that
/// repeats a location.
#[derive(Debug, Clone)]
pub struct TanksProportioned {
    pub tables: OptionTables,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ProportionedTank {
    location: usize,
    volume: usize,
    riser: usize,
    ratio_step: usize,
}

impl TanksProportioned {
    const WIDTH: usize = 4;

    fn decode_slot(&self, dv: &[f64], slot: usize, n_locations: usize) -> OptResult<ProportionedTank> {
        let s = &dv[slot * Self::WIDTH..(slot + 1) * Self::WIDTH];
        Ok(ProportionedTank {
            location: decode(s[0], n_locations + 1, "tank location")?,
            volume: decode(s[1], self.tables.tanks.len(), "tank volume option")?,
            riser: decode(s[2], self.tables.new_pipes.len(), "riser option")?,
            ratio_step: decode(s[3], H2D_RATIO_STEPS + 1, "height-to-diameter step")?,
        })
    }

    /// Tank on a junction at `junction_elevation`, or `None` when its shell
    /// cannot hold the operating band.
    fn shape(&self, design: &ProportionedTank, junction_elevation: f64) -> Option<(f64, Tank)> {
        let elevation = junction_elevation + RISER_LENGTH_FT * M_PER_FT;
        let ratio = H2D_RATIO_MIN + design.ratio_step as f64 * H2D_RATIO_STEP;
        let volume_m3 = self.tables.tanks[design.volume].volume_m3();
        // V = pi d^2 / 4 * h with h = ratio * d.
        let diameter = (4.0 * volume_m3 / std::f64::consts::PI / ratio).cbrt();
        let top = elevation + ratio * diameter;

        let (min_head, max_head) = self.tables.tank_operating_heads_m();
        if min_head <= elevation || min_head >= top || max_head > top {
            return None;
        }
        let min_level = min_head - elevation;
        let tank = Tank {
            initial_level: min_level,
            min_level,
            max_level: max_head - elevation,
            diameter,
            min_volume: std::f64::consts::PI * diameter * diameter / 4.0 * min_level,
        };
        Some((elevation, tank))
    }
}

impl<E: HydraulicEngine> Segment<E> for TanksProportioned {
    fn name(&self) -> &'static str {
        "tanks_proportioned"
    }

    fn len(&self, _wds: &WaterDistributionSystem<E>) -> OptResult<usize> {
        Ok(MAX_INSTALLABLE_TANKS * Self::WIDTH)
    }

    fn bounds(&self, wds: &WaterDistributionSystem<E>) -> OptResult<(Vec<f64>, Vec<f64>)> {
        let upper = [
            locations(wds)?.len() as f64,
            self.tables.tanks.len() as f64 - 1.0,
            self.tables.new_pipes.len() as f64 - 1.0,
            H2D_RATIO_STEPS as f64,
        ]
        .repeat(MAX_INSTALLABLE_TANKS);
        Ok((vec![0.0; upper.len()], upper))
    }

    fn apply(&self, ctx: &mut TransactionContext<'_, E>, dv: &[f64]) -> OptResult<()> {
        check_len(MAX_INSTALLABLE_TANKS * Self::WIDTH, dv)?;
        let candidates = locations(ctx.wds)?;
        let mut taken = HashSet::new();
        for slot in 0..MAX_INSTALLABLE_TANKS {
            let design = self.decode_slot(dv, slot, candidates.len())?;
            if design.location == 0 || taken.contains(&design.location) {
                continue;
            }
            let junction = &candidates[design.location - 1];
            let junction_elevation = ctx.wds.network().node(junction)?.elevation;
            let Some((elevation, tank)) = self.shape(&design, junction_elevation) else {
                tracing::debug!(slot, junction = %junction, "tank shell misses the operating band");
                continue;
            };
            ctx.begin(slot * Self::WIDTH, Self::WIDTH);
            let riser_diameter = self.tables.new_pipes[design.riser].diameter_m();
            install(ctx, slot, junction, elevation, tank, riser_diameter)?;
            taken.insert(design.location);
        }
        Ok(())
    }

    fn undo(&self, ctx: &mut TransactionContext<'_, E>, dv: &[f64]) -> OptResult<()> {
        check_len(MAX_INSTALLABLE_TANKS * Self::WIDTH, dv)?;
        undo_all(ctx, Self::WIDTH)
    }

    /// Every slot with a location pays for its tank and riser, built or not.
    fn capital_cost(&self, wds: &WaterDistributionSystem<E>, dv: &[f64]) -> OptResult<f64> {
        check_len(MAX_INSTALLABLE_TANKS * Self::WIDTH, dv)?;
        let n_locations = locations(wds)?.len();
        let mut total = 0.0;
        for slot in 0..MAX_INSTALLABLE_TANKS {
            let design = self.decode_slot(dv, slot, n_locations)?;
            if design.location == 0 {
                continue;
            }
            total += self.tables.tanks[design.volume].cost
                + self.tables.new_pipes[design.riser].cost_per_ft * RISER_LENGTH_FT;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sized_tank_geometry() {
        let design = SizedTank {
            riser: 1,
            location: 0,
            diameter: 10.0,
            hmax: 70.0,
            hmin: 65.0,
            safety: 2.0,
        };
        assert_eq!(design.elevation(), 63.0);
        let tank = design.tank();
        assert_eq!(tank.min_level, 2.0);
        assert_eq!(tank.max_level, 7.0);
        assert!((tank.min_volume - std::f64::consts::PI * 25.0 * 2.0).abs() < 1e-9);
    }

    #[test]
    fn inverted_heads_fall_back_to_top_of_range() {
        let design = SizedTank {
            riser: 1,
            location: 0,
            diameter: 10.0,
            hmax: 65.0,
            hmin: 70.0,
            safety: 1.0,
        };
        let tank = design.tank();
        assert!((tank.max_level - (TANK_HMAX_BOUNDS_M.1 - 70.0 + 1.0)).abs() < 1e-9);
    }

    #[test]
    fn sized_slots_reject_nan() {
        let seg = TanksSized {
            tables: OptionTables::default(),
        };
        let mut dv = vec![1.0, 0.0, 10.0, 70.0, 65.0, 1.0];
        dv.extend([0.0; 6]);
        assert!(seg.decode_slot(&dv, 0, 3).is_ok());
        dv[3] = f64::NAN;
        assert!(matches!(
            seg.decode_slot(&dv, 0, 3),
            Err(OptError::Numeric(_))
        ));
    }

    fn proportioned(min_head_m: f64, max_head_m: f64) -> TanksProportioned {
        let mut tables = OptionTables::default();
        tables.tank_min_operating_head_ft = min_head_m / M_PER_FT;
        tables.tank_max_operating_head_ft = max_head_m / M_PER_FT;
        TanksProportioned { tables }
    }

    #[test]
    fn proportioned_tank_holds_its_volume() {
        let seg = proportioned(112.0, 116.0);
        let design = ProportionedTank {
            location: 1,
            volume: 0,
            riser: 5,
            ratio_step: 0,
        };
        let (elevation, tank) = seg.shape(&design, 80.0).unwrap();
        assert!((elevation - (80.0 + 101.0 * M_PER_FT)).abs() < 1e-9);
        let height = 0.9 * tank.diameter;
        let volume = std::f64::consts::PI * tank.diameter.powi(2) / 4.0 * height;
        assert!((volume - 50_000.0 * M3_PER_GAL).abs() < 1e-6);
        assert!((tank.min_level - (112.0 - elevation)).abs() < 1e-9);
        assert!((tank.max_level - (116.0 - elevation)).abs() < 1e-9);
        assert_eq!(tank.initial_level, tank.min_level);
    }

    #[test]
    fn proportioned_tank_outside_the_band_is_not_built() {
        let design = ProportionedTank {
            location: 1,
            volume: 0,
            riser: 0,
            ratio_step: 0,
        };
        // Operating band below the tank floor.
        assert!(proportioned(100.0, 105.0).shape(&design, 80.0).is_none());
        // Overflow head above the shell top.
        assert!(proportioned(112.0, 140.0).shape(&design, 80.0).is_none());
    }

    #[test]
    fn proportioned_bounds_and_slots() {
        let seg = proportioned(112.0, 116.0);
        let dv = [2.0, 4.0, 9.0, 6.0, 0.0, 0.0, 0.0, 0.0];
        let design = seg.decode_slot(&dv, 0, 2).unwrap();
        assert_eq!(
            design,
            ProportionedTank {
                location: 2,
                volume: 4,
                riser: 9,
                ratio_step: 6,
            }
        );
        let mut bad = dv;
        bad[3] = 7.0;
        assert!(matches!(
            seg.decode_slot(&bad, 0, 2),
            Err(OptError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn naming_rule() {
        assert_eq!(tank_id(1), "T1");
        assert_eq!(riser_id(0), "Ris_0");
    }
}
