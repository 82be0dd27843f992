//! Shelly 3EM: three-phase energy meter publishing one numeric value per
//! topic, e.g. `shellies/shellyem3-<id>/emeter/<phase>/<measurement>`.
//!
//! `energy` and `returned_energy` do not survive a power cycle; the
//! persisted counters are `total` and `total_returned`.

use crate::collector::{ScalarCollector, ScalarSchema};
use crate::decode::ScalarTopic;
use crate::liveness::Liveness;
use crate::models::{FamilySpec, Sample};

use super::{family, DEVICE_PHASE};

pub const PATH_MARKER: &str = "/emeter/";
pub const DEVICE_PREFIX: &str = "shellyem3-";

pub const POWER: &str = "shelly3em_power";
pub const PF: &str = "shelly3em_pf";
pub const CURRENT: &str = "shelly3em_current";
pub const VOLTAGE: &str = "shelly3em_voltage";
pub const TOTAL: &str = "shelly3em_total";
pub const TOTAL_RETURNED: &str = "shelly3em_total_returned";
pub const ENERGY: &str = "shelly3em_energy";
pub const ENERGY_RETURNED: &str = "shelly3em_energy_returned";

const FAMILIES: &[FamilySpec] = &[
    family(POWER, "instantaneous active power in Watts", DEVICE_PHASE),
    family(PF, "power factor (dimensionless)", DEVICE_PHASE),
    family(CURRENT, "current in Amps", DEVICE_PHASE),
    family(VOLTAGE, "grid voltage in Volts", DEVICE_PHASE),
    family(TOTAL, "total energy in Wh (accumulated in device's non-volatile memory)", DEVICE_PHASE),
    family(
        TOTAL_RETURNED,
        "total energy returned to the grid in Wh (accumulated in device's non-volatile memory)",
        DEVICE_PHASE,
    ),
    family(ENERGY, "energy counter in Watt-minute since last report", DEVICE_PHASE),
    family(ENERGY_RETURNED, "energy returned to the grid in Watt-minute since last report", DEVICE_PHASE),
];

pub struct ThreeEm;

impl ScalarSchema for ThreeEm {
    const NAME: &'static str = "3em";
    const FAMILIES: &'static [FamilySpec] = FAMILIES;
    const UP: Liveness = Liveness::new("shelly3em_up", &["last_error"]);

    fn accepts(topic: &str) -> bool {
        topic.contains(PATH_MARKER)
    }

    fn map(topic: &str, value: f64) -> Option<Sample> {
        let t = ScalarTopic::parse(topic, DEVICE_PREFIX)?;
        let family = measurement_family(t.measurement)?;
        Some(Sample::new(family, value).label("device", t.device).label("phase", t.phase))
    }
}

pub type ThreeEmCollector = ScalarCollector<ThreeEm>;

fn measurement_family(measurement: &str) -> Option<&'static str> {
    match measurement {
        "energy" => Some(ENERGY),
        "returned_energy" => Some(ENERGY_RETURNED),
        "total" => Some(TOTAL),
        "total_returned" => Some(TOTAL_RETURNED),
        "power" => Some(POWER),
        "voltage" => Some(VOLTAGE),
        "current" => Some(CURRENT),
        "pf" => Some(PF),
        _ => None,
    }
}
