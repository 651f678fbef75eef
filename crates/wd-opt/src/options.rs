//! Priced design alternatives and fixed design constants.
//!
//! Tables keep the units they are published in (inches, $/ft, gallons) and
//! are converted where they meet the model.

use serde::{Deserialize, Serialize};

use crate::error::{OptError, OptResult};

pub const M_PER_FT: f64 = 0.3048;
pub const M_PER_IN: f64 = M_PER_FT / 12.0;
pub const M3_PER_GAL: f64 = 0.003_785_411_784;

/// Hazen-Williams C of a cleaned pipe.
pub const CLEANED_ROUGHNESS: f64 = 125.0;
/// Hazen-Williams C of duplicates and risers.
pub const NEW_ROUGHNESS: f64 = 130.0;
pub const RISER_LENGTH_FT: f64 = 101.0;
pub const SIMPLE_RISER_DIAMETER_IN: f64 = 16.0;
/// Diameter standing for "not built" on candidate new pipes.
pub const NONEXISTING_DIAMETER_FT: f64 = 0.0001;
pub const MAX_INSTALLABLE_TANKS: usize = 2;
/// Height-to-diameter ratios of proportioned tanks: `MIN + k * STEP` for
/// `k` in `0..=STEPS`.
pub const H2D_RATIO_MIN: f64 = 0.9;
pub const H2D_RATIO_STEP: f64 = 0.1;
pub const H2D_RATIO_STEPS: usize = 6;

/// Rehabilitation alternatives for an existing pipe, per diameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExistingPipeOption {
    pub diameter_in: f64,
    pub dup_city_per_ft: f64,
    pub dup_resi_per_ft: f64,
    pub clean_city_per_ft: f64,
    pub clean_resi_per_ft: f64,
}

impl ExistingPipeOption {
    pub fn diameter_m(&self) -> f64 {
        self.diameter_in * M_PER_IN
    }

    pub fn duplicate_per_ft(&self, city: bool) -> f64 {
        if city {
            self.dup_city_per_ft
        } else {
            self.dup_resi_per_ft
        }
    }

    pub fn clean_per_ft(&self, city: bool) -> f64 {
        if city {
            self.clean_city_per_ft
        } else {
            self.clean_resi_per_ft
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewPipeOption {
    pub diameter_in: f64,
    pub cost_per_ft: f64,
}

impl NewPipeOption {
    pub fn diameter_m(&self) -> f64 {
        self.diameter_in * M_PER_IN
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TankOption {
    pub volume_gal: f64,
    pub cost: f64,
}

impl TankOption {
    pub fn volume_m3(&self) -> f64 {
        self.volume_gal * M3_PER_GAL
    }
}

/// All option tables of one problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionTables {
    pub existing_pipes: Vec<ExistingPipeOption>,
    pub new_pipes: Vec<NewPipeOption>,
    pub tanks: Vec<TankOption>,
    /// Absolute heads (ft) every proportioned tank operates between.
    pub tank_min_operating_head_ft: f64,
    pub tank_max_operating_head_ft: f64,
}

impl Default for OptionTables {
    fn default() -> Self {
        let existing_pipes = [
            (6.0, 26.2, 14.2, 17.0, 12.0),
            (8.0, 27.8, 19.8, 17.0, 12.0),
            (10.0, 34.1, 25.1, 17.0, 12.0),
            (12.0, 41.4, 32.4, 17.0, 13.0),
            (14.0, 50.2, 40.2, 18.2, 14.2),
            (16.0, 58.5, 48.5, 19.8, 15.5),
            (18.0, 66.2, 57.2, 21.6, 17.1),
            (20.0, 76.8, 66.8, 23.5, 20.2),
            // No residential cleaning above 20 in.
            (24.0, 109.2, 85.5, 30.1, 1.0e6),
            (30.0, 142.5, 116.1, 41.3, 1.0e6),
        ]
        .into_iter()
        .map(|(d, dc, dr, cc, cr)| ExistingPipeOption {
            diameter_in: d,
            dup_city_per_ft: dc,
            dup_resi_per_ft: dr,
            clean_city_per_ft: cc,
            clean_resi_per_ft: cr,
        })
        .collect();

        let new_pipes = [
            (6.0, 12.8),
            (8.0, 17.8),
            (10.0, 22.5),
            (12.0, 29.2),
            (14.0, 36.2),
            (16.0, 43.6),
            (18.0, 51.5),
            (20.0, 60.1),
            (24.0, 77.0),
            (30.0, 105.5),
        ]
        .into_iter()
        .map(|(diameter_in, cost_per_ft)| NewPipeOption {
            diameter_in,
            cost_per_ft,
        })
        .collect();

        let tanks = [
            (50_000.0, 115_000.0),
            (100_000.0, 145_000.0),
            (250_000.0, 325_000.0),
            (500_000.0, 425_000.0),
            (1_000_000.0, 600_000.0),
        ]
        .into_iter()
        .map(|(volume_gal, cost)| TankOption { volume_gal, cost })
        .collect();

        Self {
            existing_pipes,
            new_pipes,
            tanks,
            tank_min_operating_head_ft: 225.0,
            tank_max_operating_head_ft: 250.0,
        }
    }
}

impl OptionTables {
    pub fn validate(&self) -> OptResult<()> {
        if self.existing_pipes.is_empty() || self.new_pipes.is_empty() || self.tanks.is_empty() {
            return Err(OptError::settings("option tables must not be empty"));
        }
        let diameters = self
            .existing_pipes
            .iter()
            .map(|o| o.diameter_in)
            .chain(self.new_pipes.iter().map(|o| o.diameter_in));
        for d in diameters {
            if !(d > 0.0) {
                return Err(OptError::settings(format!("option diameter {d} in")));
            }
        }
        if self.tanks.iter().any(|t| !(t.volume_gal > 0.0)) {
            return Err(OptError::settings("tank option volumes must be positive"));
        }
        if !(self.tank_min_operating_head_ft.is_finite()
            && self.tank_max_operating_head_ft.is_finite()
            && self.tank_min_operating_head_ft < self.tank_max_operating_head_ft)
        {
            return Err(OptError::settings(
                "tank operating heads must be finite with min below max",
            ));
        }
        Ok(())
    }

    /// `(min, max)` operating heads in metres.
    pub fn tank_operating_heads_m(&self) -> (f64, f64) {
        (
            self.tank_min_operating_head_ft * M_PER_FT,
            self.tank_max_operating_head_ft * M_PER_FT,
        )
    }

    /// Cleaning option matching a pipe diameter (m).
    pub fn existing_for_diameter(&self, diameter_m: f64) -> Option<&ExistingPipeOption> {
        self.existing_pipes
            .iter()
            .find(|o| (o.diameter_m() - diameter_m).abs() < 1e-4)
    }

    pub fn new_pipe_for_diameter(&self, diameter_in: f64) -> Option<&NewPipeOption> {
        self.new_pipes
            .iter()
            .find(|o| (o.diameter_in - diameter_in).abs() < 1e-9)
    }

    /// Tank price at an arbitrary volume: linear between the neighbouring
    /// options, extrapolated from the end pairs outside the table.
    pub fn tank_cost(&self, volume_gal: f64) -> f64 {
        let mut sorted = self.tanks.clone();
        sorted.sort_by(|a, b| a.volume_gal.total_cmp(&b.volume_gal));
        match sorted.as_slice() {
            [] => 0.0,
            [only] => only.cost,
            _ => {
                let upper = sorted
                    .iter()
                    .position(|t| t.volume_gal >= volume_gal)
                    .unwrap_or(sorted.len() - 1)
                    .clamp(1, sorted.len() - 1);
                interpolate(&sorted[upper - 1], &sorted[upper], volume_gal)
            }
        }
    }
}

fn interpolate(a: &TankOption, b: &TankOption, volume_gal: f64) -> f64 {
    let span = b.volume_gal - a.volume_gal;
    if span == 0.0 {
        return (a.cost + b.cost) / 2.0;
    }
    a.cost + (volume_gal - a.volume_gal) / span * (b.cost - a.cost)
}

/// Decode a decision slot as a code in `0..len`.
pub(crate) fn decode(value: f64, len: usize, what: &'static str) -> OptResult<usize> {
    wd_core::decode_option(value, len, what)
        .map_err(|_| OptError::IndexOutOfRange { what, value, len })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tables_validate() {
        let tables = OptionTables::default();
        tables.validate().unwrap();
        assert_eq!(tables.existing_pipes.len(), 10);
        assert_eq!(tables.new_pipes.len(), 10);
        assert_eq!(tables.tanks.len(), 5);
        assert!(tables.new_pipe_for_diameter(SIMPLE_RISER_DIAMETER_IN).is_some());
    }

    #[test]
    fn inverted_operating_heads_are_rejected() {
        let mut tables = OptionTables::default();
        let (lo, hi) = tables.tank_operating_heads_m();
        assert!((lo - 68.58).abs() < 1e-9 && (hi - 76.2).abs() < 1e-9);
        tables.tank_min_operating_head_ft = 260.0;
        assert!(matches!(tables.validate(), Err(OptError::Settings { .. })));
    }

    #[test]
    fn cleaning_option_matches_metric_diameter() {
        let tables = OptionTables::default();
        let twelve = tables.existing_for_diameter(12.0 * M_PER_IN).unwrap();
        assert_eq!(twelve.clean_per_ft(true), 17.0);
        assert_eq!(twelve.clean_per_ft(false), 13.0);
        assert!(tables.existing_for_diameter(0.5).is_none());
    }

    #[test]
    fn tank_cost_hits_table_points() {
        let tables = OptionTables::default();
        assert!((tables.tank_cost(50_000.0) - 115_000.0).abs() < 1e-9);
        assert!((tables.tank_cost(250_000.0) - 325_000.0).abs() < 1e-9);
        assert!((tables.tank_cost(1_000_000.0) - 600_000.0).abs() < 1e-9);
    }

    #[test]
    fn tank_cost_interpolates_and_extrapolates() {
        let tables = OptionTables::default();
        assert!((tables.tank_cost(75_000.0) - 130_000.0).abs() < 1e-9);
        // Below the table: slope of the first pair (0.6 $/gal).
        assert!((tables.tank_cost(0.0) - 85_000.0).abs() < 1e-9);
        // Above: slope of the last pair (0.35 $/gal).
        assert!((tables.tank_cost(1_100_000.0) - 635_000.0).abs() < 1e-9);
    }

    #[test]
    fn decode_reports_value_and_table_size() {
        assert_eq!(decode(2.0, 3, "action").unwrap(), 2);
        match decode(3.0, 3, "action") {
            Err(OptError::IndexOutOfRange { what, value, len }) => {
                assert_eq!((what, value, len), ("action", 3.0, 3));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(decode(-1.0, 3, "action").is_err());
    }
}
