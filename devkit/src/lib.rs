/*!
# Shelly DevKit - Stubs et utilitaires de test pour l'exporter

Bibliothèque facilitant les tests de l'exporter sans broker ni appareils :
- Feed MQTT simulé qui pousse dans la file d'ingestion
- Rejeu de captures produites par `shelly-exporter debug`
- Harness de test : engine + ingestion + scrape
*/

pub mod capture;
pub mod mqtt_stub;
pub mod test_utils;

pub use capture::{load_capture, parse_capture, CaptureError};
pub use mqtt_stub::{MockMqttFeed, ShellyMessageBuilder};
pub use test_utils::TestHarness;
