// wd-core/src/units.rs

//! Unit handling at the engine boundary.
//!
//! The engine stores values in the units implied by the network's flow units
//! (US customary for CFS/GPM/MGD, metric otherwise). Everything inside the
//! model uses one internal set: metres for lengths, heads and diameters,
//! litres per second for flows, m/s, kW and m³.

use uom::si::f64::{
    Length as UomLength, Power as UomPower, Pressure as UomPressure, Velocity as UomVelocity,
    Volume as UomVolume, VolumeRate as UomVolumeRate,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub type Length = UomLength;
pub type Power = UomPower;
pub type Pressure = UomPressure;
pub type Velocity = UomVelocity;
pub type Volume = UomVolume;
pub type FlowRate = UomVolumeRate;

/// Flow units of a loaded network; they also select the unit system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FlowUnits {
    Cfs,
    Gpm,
    Mgd,
    #[default]
    Lps,
    Lpm,
    Cmh,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitSystem {
    UsCustomary,
    Metric,
}

impl FlowUnits {
    pub fn system(self) -> UnitSystem {
        match self {
            FlowUnits::Cfs | FlowUnits::Gpm | FlowUnits::Mgd => UnitSystem::UsCustomary,
            FlowUnits::Lps | FlowUnits::Lpm | FlowUnits::Cmh => UnitSystem::Metric,
        }
    }

    fn flow(self, v: f64) -> FlowRate {
        use uom::si::volume_rate::{
            cubic_foot_per_second, cubic_meter_per_hour, gallon_per_day, gallon_per_minute,
            liter_per_minute, liter_per_second,
        };
        match self {
            FlowUnits::Cfs => FlowRate::new::<cubic_foot_per_second>(v),
            FlowUnits::Gpm => FlowRate::new::<gallon_per_minute>(v),
            FlowUnits::Mgd => FlowRate::new::<gallon_per_day>(v * 1.0e6),
            FlowUnits::Lps => FlowRate::new::<liter_per_second>(v),
            FlowUnits::Lpm => FlowRate::new::<liter_per_minute>(v),
            FlowUnits::Cmh => FlowRate::new::<cubic_meter_per_hour>(v),
        }
    }

    fn flow_value(self, q: FlowRate) -> f64 {
        use uom::si::volume_rate::{
            cubic_foot_per_second, cubic_meter_per_hour, gallon_per_day, gallon_per_minute,
            liter_per_minute, liter_per_second,
        };
        match self {
            FlowUnits::Cfs => q.get::<cubic_foot_per_second>(),
            FlowUnits::Gpm => q.get::<gallon_per_minute>(),
            FlowUnits::Mgd => q.get::<gallon_per_day>() / 1.0e6,
            FlowUnits::Lps => q.get::<liter_per_second>(),
            FlowUnits::Lpm => q.get::<liter_per_minute>(),
            FlowUnits::Cmh => q.get::<cubic_meter_per_hour>(),
        }
    }
}

/// Physical category of a value crossing the engine boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quantity {
    /// Elevations, heads, levels, lengths: ft or m.
    Length,
    /// Pipe diameters: in or mm.
    Diameter,
    /// Tank diameters: ft or m.
    TankDiameter,
    /// Pressures: psi or m of water.
    Pressure,
    Flow,
    /// ft³ or m³.
    Volume,
    /// hp or kW.
    Power,
    /// ft/s or m/s.
    Velocity,
    /// Roughness, status, multipliers, pattern indices, energy in kW.
    Unitless,
}

/// Density of water times standard gravity, N/m³.
pub const WATER_SPECIFIC_WEIGHT: f64 = 1000.0 * 9.806_65;

/// Convert an engine-native value to the internal unit set.
pub fn to_internal(value: f64, quantity: Quantity, units: FlowUnits) -> f64 {
    use uom::si::length::{foot, inch, meter, millimeter};
    use uom::si::power::{horsepower, kilowatt};
    use uom::si::pressure::{pascal, pound_force_per_square_inch};
    use uom::si::velocity::{foot_per_second, meter_per_second};
    use uom::si::volume::{cubic_foot, cubic_meter};
    use uom::si::volume_rate::liter_per_second;

    let us = units.system() == UnitSystem::UsCustomary;
    match quantity {
        Quantity::Length | Quantity::TankDiameter if us => {
            Length::new::<foot>(value).get::<meter>()
        }
        Quantity::Length | Quantity::TankDiameter => value,
        Quantity::Diameter if us => Length::new::<inch>(value).get::<meter>(),
        Quantity::Diameter => Length::new::<millimeter>(value).get::<meter>(),
        Quantity::Pressure if us => {
            Pressure::new::<pound_force_per_square_inch>(value).get::<pascal>()
                / WATER_SPECIFIC_WEIGHT
        }
        Quantity::Pressure => value,
        Quantity::Flow => units.flow(value).get::<liter_per_second>(),
        Quantity::Volume if us => Volume::new::<cubic_foot>(value).get::<cubic_meter>(),
        Quantity::Volume => value,
        Quantity::Power if us => Power::new::<horsepower>(value).get::<kilowatt>(),
        Quantity::Power => value,
        Quantity::Velocity if us => {
            Velocity::new::<foot_per_second>(value).get::<meter_per_second>()
        }
        Quantity::Velocity => value,
        Quantity::Unitless => value,
    }
}

/// Convert an internal value back to the engine's native units.
pub fn from_internal(value: f64, quantity: Quantity, units: FlowUnits) -> f64 {
    use uom::si::length::{foot, inch, meter, millimeter};
    use uom::si::power::{horsepower, kilowatt};
    use uom::si::pressure::{pascal, pound_force_per_square_inch};
    use uom::si::velocity::{foot_per_second, meter_per_second};
    use uom::si::volume::{cubic_foot, cubic_meter};
    use uom::si::volume_rate::liter_per_second;

    let us = units.system() == UnitSystem::UsCustomary;
    match quantity {
        Quantity::Length | Quantity::TankDiameter if us => {
            Length::new::<meter>(value).get::<foot>()
        }
        Quantity::Length | Quantity::TankDiameter => value,
        Quantity::Diameter if us => Length::new::<meter>(value).get::<inch>(),
        Quantity::Diameter => Length::new::<meter>(value).get::<millimeter>(),
        Quantity::Pressure if us => Pressure::new::<pascal>(value * WATER_SPECIFIC_WEIGHT)
            .get::<pound_force_per_square_inch>(),
        Quantity::Pressure => value,
        Quantity::Flow => units.flow_value(FlowRate::new::<liter_per_second>(value)),
        Quantity::Volume if us => Volume::new::<cubic_meter>(value).get::<cubic_foot>(),
        Quantity::Volume => value,
        Quantity::Power if us => Power::new::<kilowatt>(value).get::<horsepower>(),
        Quantity::Power => value,
        Quantity::Velocity if us => {
            Velocity::new::<meter_per_second>(value).get::<foot_per_second>()
        }
        Quantity::Velocity => value,
        Quantity::Unitless => value,
    }
}

#[inline]
pub fn ft(v: f64) -> Length {
    use uom::si::length::foot;
    Length::new::<foot>(v)
}

#[inline]
pub fn inches(v: f64) -> Length {
    use uom::si::length::inch;
    Length::new::<inch>(v)
}

#[inline]
pub fn gallons(v: f64) -> Volume {
    use uom::si::volume::gallon;
    Volume::new::<gallon>(v)
}

#[inline]
pub fn psi(v: f64) -> Pressure {
    use uom::si::pressure::pound_force_per_square_inch;
    Pressure::new::<pound_force_per_square_inch>(v)
}

/// Pressure expressed as metres of water column.
pub fn pressure_head_m(p: Pressure) -> f64 {
    use uom::si::pressure::pascal;
    p.get::<pascal>() / WATER_SPECIFIC_WEIGHT
}

pub fn meters(l: Length) -> f64 {
    use uom::si::length::meter;
    l.get::<meter>()
}

pub fn cubic_meters(v: Volume) -> f64 {
    use uom::si::volume::cubic_meter;
    v.get::<cubic_meter>()
}
