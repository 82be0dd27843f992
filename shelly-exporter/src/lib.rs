//! Shelly exporter - MQTT telemetry to Prometheus.
//!
//! Incoming `(topic, payload)` messages are coalesced per device class into
//! in-memory state by a single ingestion task. Each scrape captures that
//! state atomically (latest report, or a drain of per-measurement values),
//! decodes it into samples and reports success through a `*_up` metric.

pub mod collector;
pub mod config;
pub mod decode;
pub mod devices;
pub mod engine;
pub mod error;
pub mod exposition;
pub mod http;
pub mod liveness;
pub mod models;
pub mod mqtt;
pub mod state;

pub use collector::{Collector, Ingest, Snapshot};
pub use engine::{Engine, IngestStats};
pub use error::{ConfigError, DecodeError, ExpositionError, ScrapeError};
pub use models::{FamilySpec, Sample, Scrape, Telemetry};
