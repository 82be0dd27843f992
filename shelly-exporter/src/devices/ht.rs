//! Shelly H&T (gen1): temperature/humidity sensor reporting a full
//! object on `shellies/<id>/info`.

use crate::collector::{ReportCollector, ReportSchema};
use crate::decode::decode_report;
use crate::error::DecodeError;
use crate::liveness::Liveness;
use crate::models::{FamilySpec, Sample, Telemetry};
use serde::Deserialize;

use super::{family, DEVICE_UNIT};

pub const REPORT_SUFFIX: &str = "/info";

pub const TEMPERATURE: &str = "shellyht_temperature";
pub const HUMIDITY: &str = "shellyht_humidity";
pub const BATTERY: &str = "shellyht_battery";

const FAMILIES: &[FamilySpec] = &[
    family(TEMPERATURE, "Sensor temperature", DEVICE_UNIT),
    family(HUMIDITY, "Sensor humidity", DEVICE_UNIT),
    family(BATTERY, "Sensor battery", DEVICE_UNIT),
];

/// Sous-ensemble du rapport `/info` utilisé par l'exporter ; champs absents = 0
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Info {
    pub mac: String,
    pub is_valid: bool,
    pub tmp: Tmp,
    pub hum: Hum,
    pub bat: Bat,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Tmp {
    pub value: f64,
    pub units: String,
    #[serde(rename = "tC")]
    pub t_c: f64,
    #[serde(rename = "tF")]
    pub t_f: f64,
    pub is_valid: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Hum {
    pub value: f64,
    pub is_valid: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Bat {
    pub value: i64,
    pub voltage: f64,
}

pub struct Ht;

impl ReportSchema for Ht {
    const NAME: &'static str = "ht";
    const FAMILIES: &'static [FamilySpec] = FAMILIES;
    const UP: Liveness = Liveness::new("shellyht_up", &["status"]);

    fn accepts(msg: &Telemetry) -> bool {
        msg.topic.ends_with(REPORT_SUFFIX)
    }

    fn map(msg: &Telemetry) -> Result<Vec<Sample>, DecodeError> {
        let info: Info = decode_report(&msg.payload)?;
        Ok(map_info(&info))
    }
}

pub type HtCollector = ReportCollector<Ht>;

pub fn map_info(info: &Info) -> Vec<Sample> {
    let dev = info.mac.as_str();
    vec![
        Sample::new(TEMPERATURE, info.tmp.t_c).label("device", dev).label("unit", "c"),
        Sample::new(TEMPERATURE, info.tmp.t_f).label("device", dev).label("unit", "f"),
        Sample::new(HUMIDITY, info.hum.value).label("device", dev).label("unit", "%"),
        Sample::new(BATTERY, info.bat.voltage).label("device", dev).label("unit", "V"),
        Sample::new(BATTERY, info.bat.value as f64).label("device", dev).label("unit", "%"),
    ]
}
