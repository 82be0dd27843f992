//! Shelly H&T Gen3: RPC notifications on `<prefix>/events/rpc`. Only
//! `NotifyFullStatus` carries the sensor readings; partial `NotifyStatus`
//! updates are skipped.

use crate::collector::{ReportCollector, ReportSchema};
use crate::decode::{decode_rpc, probe_method, RpcEnvelope, NOTIFY_FULL_STATUS};
use crate::error::DecodeError;
use crate::liveness::Liveness;
use crate::models::{FamilySpec, Sample, Telemetry};
use serde::Deserialize;
use tracing::warn;

use super::{family, DEVICE_UNIT};

pub const REPORT_SUFFIX: &str = "/rpc";

pub const TEMPERATURE: &str = "shellyhtgen3_temperature";
pub const HUMIDITY: &str = "shellyhtgen3_humidity";
pub const BATTERY: &str = "shellyhtgen3_battery";

const FAMILIES: &[FamilySpec] = &[
    family(TEMPERATURE, "Sensor temperature", DEVICE_UNIT),
    family(HUMIDITY, "Sensor humidity", DEVICE_UNIT),
    family(BATTERY, "Sensor battery", DEVICE_UNIT),
];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Event {
    pub src: String,
    pub dst: String,
    pub method: String,
    pub params: Params,
}

impl RpcEnvelope for Event {
    fn method(&self) -> &str {
        &self.method
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Params {
    pub ts: f64,
    #[serde(rename = "devicepower:0")]
    pub devicepower0: DevicePower,
    #[serde(rename = "humidity:0")]
    pub humidity0: Humidity,
    #[serde(rename = "temperature:0")]
    pub temperature0: Temperature,
    pub sys: Sys,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DevicePower {
    pub id: i64,
    pub battery: Battery,
    pub external: External,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Battery {
    #[serde(rename = "V")]
    pub v: f64,
    pub percent: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct External {
    pub present: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Humidity {
    pub id: i64,
    pub rh: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Temperature {
    pub id: i64,
    #[serde(rename = "tC")]
    pub t_c: f64,
    #[serde(rename = "tF")]
    pub t_f: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Sys {
    pub mac: String,
    pub uptime: i64,
    pub wakeup_period: i64,
}

pub struct HtGen3;

impl ReportSchema for HtGen3 {
    const NAME: &'static str = "htgen3";
    const FAMILIES: &'static [FamilySpec] = FAMILIES;
    const UP: Liveness = Liveness::new("shellyhtgen3_up", &["status"]);

    fn accepts(msg: &Telemetry) -> bool {
        probe_method(&msg.payload).as_deref() == Some(NOTIFY_FULL_STATUS)
    }

    fn map(msg: &Telemetry) -> Result<Vec<Sample>, DecodeError> {
        if !msg.topic.ends_with(REPORT_SUFFIX) {
            warn!(collector = Self::NAME, topic = %msg.topic, "unhandled topic");
            return Ok(Vec::new());
        }
        match decode_rpc::<Event>(&msg.payload, NOTIFY_FULL_STATUS)? {
            Some(event) => Ok(map_event(&event)),
            None => Ok(Vec::new()),
        }
    }
}

pub type HtGen3Collector = ReportCollector<HtGen3>;

pub fn map_event(event: &Event) -> Vec<Sample> {
    // src = identifiant appareil (shellyhtg3-<mac>)
    let dev = event.src.as_str();
    let p = &event.params;
    vec![
        Sample::new(TEMPERATURE, p.temperature0.t_c).label("device", dev).label("unit", "c"),
        Sample::new(TEMPERATURE, p.temperature0.t_f).label("device", dev).label("unit", "f"),
        Sample::new(HUMIDITY, p.humidity0.rh).label("device", dev).label("unit", "%"),
        Sample::new(BATTERY, p.devicepower0.battery.v).label("device", dev).label("unit", "V"),
        Sample::new(BATTERY, p.devicepower0.battery.percent as f64).label("device", dev).label("unit", "%"),
    ]
}
