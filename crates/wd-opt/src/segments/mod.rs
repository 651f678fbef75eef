//! The decision-vector segments.

pub mod existing_pipes;
pub mod new_pipes;
pub mod pumps;
pub mod tanks;

pub use existing_pipes::{CITY_PIPES, EXISTING_PIPES, ExistingPipes, PipeEncoding, duplicate_id};
pub use new_pipes::{NEW_PIPES, NewPipes};
pub use pumps::{PERIODS_PER_DAY, PumpSchedule, decompose_group_schedule, set_group_operations};
pub use tanks::{
    POSSIBLE_TANK_LOCATIONS, TanksProportioned, TanksSimple, TanksSized, riser_id, tank_id,
};
