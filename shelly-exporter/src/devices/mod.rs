//! Device classes: one payload schema and one metric mapping each.
//!
//! - `ht`: Shelly H&T, one JSON report per wake-up on `shellies/<id>/info`
//! - `htgen3`: Shelly H&T Gen3, RPC `NotifyFullStatus` envelopes
//! - `threeem`: Shelly 3EM, one numeric message per phase and measurement

pub mod ht;
pub mod htgen3;
pub mod threeem;

use crate::models::FamilySpec;

pub(crate) const DEVICE_UNIT: &[&str] = &["device", "unit"];
pub(crate) const DEVICE_PHASE: &[&str] = &["device", "phase"];

pub(crate) const fn family(name: &'static str, help: &'static str, label_keys: &'static [&'static str]) -> FamilySpec {
    FamilySpec { name, help, label_keys }
}
