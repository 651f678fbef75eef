//! Cost and reliability objectives, read from the results of the last run.

use serde::{Deserialize, Serialize};
use wd_core::TimeSeries;
use wd_core::units::{WATER_SPECIFIC_WEIGHT, pressure_head_m, psi};
use wd_engine::HydraulicEngine;
use wd_sim::{HydraulicRun, WaterDistributionSystem};

use crate::error::{OptError, OptResult};

const SECONDS_PER_HOUR: f64 = 3600.0;
const DAYS_PER_YEAR: f64 = 365.0;

/// Which reliability objective a problem minimises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReliabilityFormulation {
    /// Negated mean resilience, penalised by pressure deficiency.
    #[default]
    Base,
    /// Solver warnings in (1, 2], then pressure deficit in (0, 1], then
    /// negated resilience in [-1, 0].
    Hierarchical,
    /// [`ReliabilityFormulation::Hierarchical`] with a pipe velocity limit
    /// averaged into the pressure violation.
    HierarchicalWithMaxVelocity,
}

/// Economic and service parameters of the objectives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveSettings {
    /// Pressure every junction should keep (psi)
    pub min_pressure_psi: f64,
    pub discount_rate: f64,
    pub years: u32,
    /// $/kWh
    pub energy_price: f64,
    pub reliability: ReliabilityFormulation,
    /// Pipe velocity limit of the velocity-aware reliability (m/s)
    pub max_velocity_m_per_s: f64,
}

impl Default for ObjectiveSettings {
    fn default() -> Self {
        Self {
            min_pressure_psi: 40.0,
            discount_rate: 0.12,
            years: 20,
            energy_price: 0.12,
            reliability: ReliabilityFormulation::Base,
            max_velocity_m_per_s: 2.0,
        }
    }
}

impl ObjectiveSettings {
    pub fn validate(&self) -> OptResult<()> {
        if !(self.min_pressure_psi.is_finite() && self.min_pressure_psi > 0.0) {
            return Err(OptError::settings("min_pressure_psi must be positive"));
        }
        if !(self.discount_rate.is_finite() && self.discount_rate > -1.0) {
            return Err(OptError::settings("discount_rate must be above -1"));
        }
        if !self.energy_price.is_finite() {
            return Err(OptError::settings("energy_price must be finite"));
        }
        if !(self.max_velocity_m_per_s.is_finite() && self.max_velocity_m_per_s > 0.0) {
            return Err(OptError::settings("max_velocity_m_per_s must be positive"));
        }
        Ok(())
    }

    pub fn min_pressure_m(&self) -> f64 {
        pressure_head_m(psi(self.min_pressure_psi))
    }
}

/// Net present value of an investment `initial` followed by `years` equal
/// end-of-year cash flows.
pub fn npv(initial: f64, rate: f64, cash_flow: f64, years: u32) -> f64 {
    (1..=years).fold(-initial, |acc, k| {
        acc + cash_flow / (1.0 + rate).powi(k as i32)
    })
}

fn sample(series: &TimeSeries, id: &str, t: u64) -> OptResult<f64> {
    series.at(t).ok_or_else(|| OptError::MissingResult {
        id: id.to_string(),
        t,
    })
}

/// Energy bill of one simulated day over every pump.
pub fn energy_cost_per_day<E: HydraulicEngine>(
    wds: &WaterDistributionSystem<E>,
    price_per_kwh: f64,
) -> OptResult<f64> {
    let net = wds.network();
    let mut kwh = 0.0;
    for id in net.pumps().ids() {
        kwh += net.link(id)?.results.energy.integral() / SECONDS_PER_HOUR;
    }
    Ok(kwh * price_per_kwh)
}

/// Capital plus twenty years (by default) of discounted energy bills.
pub fn cost<E: HydraulicEngine>(
    wds: &WaterDistributionSystem<E>,
    capital: f64,
    settings: &ObjectiveSettings,
) -> OptResult<f64> {
    let daily = energy_cost_per_day(wds, settings.energy_price)?;
    tracing::debug!(capital, daily, "cost terms");
    Ok(-npv(
        capital,
        settings.discount_rate,
        -DAYS_PER_YEAR * daily,
        settings.years,
    ))
}

/// Todini resilience index at every recorded time.
///
/// Zero at a step where a demanding junction has negative head; a tiny
/// positive value when the available surplus is not positive.
pub fn resilience_index<E: HydraulicEngine>(
    wds: &WaterDistributionSystem<E>,
    min_pressure_m: f64,
) -> OptResult<TimeSeries> {
    let net = wds.network();
    let mut series = TimeSeries::new();
    'steps: for &t in wds.times() {
        let mut surplus = 0.0;
        let mut required = 0.0;
        for id in net.junctions().ids() {
            let node = net.node(id)?;
            let head = sample(&node.results.head, id, t)?;
            let demand = sample(&node.results.demand, id, t)?;
            if head < 0.0 && demand > 0.0 {
                series.commit(t, 0.0)?;
                continue 'steps;
            }
            let h_req = node.elevation + min_pressure_m;
            surplus += demand * (head - h_req) / 1000.0;
            required += demand * h_req / 1000.0;
        }

        let mut supplied = 0.0;
        for id in net.reservoirs().ids().chain(net.tanks().ids()) {
            let node = net.node(id)?;
            let head = sample(&node.results.head, id, t)?;
            let demand = sample(&node.results.demand, id, t)?;
            supplied += -demand * head / 1000.0;
        }
        for id in net.pumps().ids() {
            let energy = sample(&net.link(id)?.results.energy, id, t)?;
            supplied += energy / WATER_SPECIFIC_WEIGHT * 1000.0;
        }

        let available = supplied - required;
        let index = if available > 0.0 {
            surplus / available
        } else {
            f64::MIN_POSITIVE
        };
        series.commit(t, index)?;
    }
    Ok(series)
}

/// Mean relative pressure shortfall over junctions at every recorded time.
pub fn pressure_deficiency<E: HydraulicEngine>(
    wds: &WaterDistributionSystem<E>,
    min_pressure_m: f64,
) -> OptResult<TimeSeries> {
    let net = wds.network();
    let n = net.junctions().len();
    let mut series = TimeSeries::new();
    for &t in wds.times() {
        let mut deficit = 0.0;
        for id in net.junctions().ids() {
            let pressure = sample(&net.node(id)?.results.pressure, id, t)?;
            deficit += (min_pressure_m - pressure).max(0.0) / min_pressure_m;
        }
        let value = if n == 0 { 0.0 } else { deficit / n as f64 };
        series.commit(t, value)?;
    }
    Ok(series)
}

/// Negated mean resilience, penalised by pressure deficiency.
///
/// When no step has a positive resilience the value becomes the summed
/// relative deficit instead, so infeasible designs rank by how far off they are.
pub fn base_reliability<E: HydraulicEngine>(
    wds: &WaterDistributionSystem<E>,
    settings: &ObjectiveSettings,
) -> OptResult<f64> {
    let p_min = settings.min_pressure_m();
    let resilience = resilience_index(wds, p_min)?;
    let deficiency = pressure_deficiency(wds, p_min)?;
    let mut value = -resilience.time_weighted_mean();
    if value >= 0.0 {
        value = deficiency.values().sum();
    } else {
        value *= 1.0 - deficiency.time_weighted_mean();
    }
    Ok(value)
}

/// Ranked reliability: a run with solver warnings scores 1 plus the share of
/// warned steps, a run short of pressure scores its mean relative deficit,
/// and only a feasible run is scored by negated mean resilience.
pub fn hierarchical_reliability<E: HydraulicEngine>(
    wds: &WaterDistributionSystem<E>,
    run: &HydraulicRun,
    settings: &ObjectiveSettings,
) -> OptResult<f64> {
    let n_steps = run.steps.len();
    let warned = run.steps.iter().filter(|(_, code)| !code.is_ok()).count();
    if warned > 0 {
        return Ok(1.0 + warned as f64 / n_steps as f64);
    }

    let p_min = settings.min_pressure_m();
    let deficiency = pressure_deficiency(wds, p_min)?;
    if deficiency.integral() > 0.0 {
        return Ok(deficiency.time_weighted_mean());
    }
    Ok(-resilience_index(wds, p_min)?.time_weighted_mean())
}

/// Highest speed recorded in any pipe, temporary ones included.
pub fn max_pipe_velocity<E: HydraulicEngine>(wds: &WaterDistributionSystem<E>) -> OptResult<f64> {
    let net = wds.network();
    let mut max = 0.0f64;
    for id in net.pipes().ids() {
        for v in net.link(id)?.results.velocity.values() {
            max = max.max(v.abs());
        }
    }
    Ok(max)
}

/// [`hierarchical_reliability`] with the relative excess over the velocity
/// limit averaged into the pressure violation. Solver warnings pass through.
pub fn velocity_reliability<E: HydraulicEngine>(
    wds: &WaterDistributionSystem<E>,
    run: &HydraulicRun,
    settings: &ObjectiveSettings,
) -> OptResult<f64> {
    let value = hierarchical_reliability(wds, run, settings)?;
    if value >= 1.0 {
        return Ok(value);
    }
    let limit = settings.max_velocity_m_per_s;
    let velocity_violation = ((max_pipe_velocity(wds)? - limit) / limit).max(0.0);
    let violation = (value.max(0.0) + velocity_violation) / 2.0;
    if violation > 0.0 {
        Ok(violation)
    } else {
        Ok(value.min(0.0))
    }
}

/// The reliability objective chosen in `settings`.
pub fn reliability<E: HydraulicEngine>(
    wds: &WaterDistributionSystem<E>,
    run: &HydraulicRun,
    settings: &ObjectiveSettings,
) -> OptResult<f64> {
    match settings.reliability {
        ReliabilityFormulation::Base => base_reliability(wds, settings),
        ReliabilityFormulation::Hierarchical => hierarchical_reliability(wds, run, settings),
        ReliabilityFormulation::HierarchicalWithMaxVelocity => {
            velocity_reliability(wds, run, settings)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn npv_of_flat_cash_flow() {
        assert_eq!(npv(100.0, 0.1, 0.0, 20), -100.0);
        let v = npv(0.0, 0.1, 110.0, 1);
        assert!((v - 100.0).abs() < 1e-9);
        let two = npv(50.0, 0.0, 10.0, 2);
        assert!((two + 30.0).abs() < 1e-12);
    }

    #[test]
    fn cost_is_capital_plus_discounted_energy() {
        // -npv(I, r, -c, n) = I + c * annuity(r, n)
        let annuity: f64 = (1..=20).map(|k| 1.0 / 1.12f64.powi(k)).sum();
        let c = -npv(1000.0, 0.12, -365.0 * 2.0, 20);
        assert!((c - (1000.0 + 730.0 * annuity)).abs() < 1e-6);
    }

    #[test]
    fn forty_psi_in_metres() {
        let m = ObjectiveSettings::default().min_pressure_m();
        assert!((m - 28.123).abs() < 1e-3);
    }

    #[test]
    fn reliability_formulation_parses() {
        let s: ObjectiveSettings =
            serde_yaml::from_str("reliability: hierarchical_with_max_velocity\n").unwrap();
        assert_eq!(s.reliability, ReliabilityFormulation::HierarchicalWithMaxVelocity);
        assert_eq!(s.max_velocity_m_per_s, 2.0);
        let bad = ObjectiveSettings {
            max_velocity_m_per_s: 0.0,
            ..s
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn settings_reject_bad_pressure() {
        let s = ObjectiveSettings {
            min_pressure_psi: 0.0,
            ..Default::default()
        };
        assert!(matches!(s.validate(), Err(OptError::Settings { .. })));
    }
}
