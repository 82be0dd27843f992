/*!
Feed MQTT simulé pour tester l'ingestion sans broker

Joue le rôle de l'adaptateur MQTT : chaque message simulé est enregistré
puis poussé dans la file de l'Engine, comme le ferait le listener rumqttc.
*/

use anyhow::Result;
use rumqttc::QoS;
use serde_json::Value;
use shelly_exporter::Telemetry;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

impl From<MockMessage> for Telemetry {
    fn from(m: MockMessage) -> Self {
        Telemetry::new(m.topic, m.payload)
    }
}

/// Feed qui simule les publish reçus par l'exporter
#[derive(Clone)]
pub struct MockMqttFeed {
    delivered: Arc<Mutex<Vec<MockMessage>>>,
    sender: Arc<Mutex<Option<mpsc::Sender<Telemetry>>>>,
}

impl MockMqttFeed {
    pub fn new() -> Self {
        Self {
            delivered: Arc::new(Mutex::new(Vec::new())),
            sender: Arc::new(Mutex::new(None)),
        }
    }

    /// Crée la file d'ingestion ; le receiver est à donner à `Engine::spawn_ingestion`.
    pub fn setup_receiver(&self, capacity: usize) -> mpsc::Receiver<Telemetry> {
        let (sender, receiver) = mpsc::channel(capacity);
        *self.sender.lock().unwrap() = Some(sender);
        receiver
    }

    /// Simule la réception d'un message
    pub async fn simulate_incoming<S, V>(&self, topic: S, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let message = MockMessage {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtMostOnce,
            retain: false,
        };

        let sender = self.sender.lock().unwrap().clone();
        let Some(sender) = sender else {
            anyhow::bail!("feed closed, no receiver for {}", message.topic);
        };
        self.delivered.lock().unwrap().push(message.clone());
        sender
            .send(message.clone().into())
            .await
            .map_err(|e| anyhow::anyhow!("Send error: {}", e))?;

        tracing::debug!(topic = %message.topic, "[MOCK] simulated incoming");
        Ok(())
    }

    /// Ferme la file : la tâche d'ingestion se termine après avoir tout consommé
    pub fn close(&self) {
        self.sender.lock().unwrap().take();
    }

    pub fn is_open(&self) -> bool {
        self.sender.lock().unwrap().is_some()
    }

    /// Tous les messages livrés (pour assertions de tests)
    pub fn delivered(&self) -> Vec<MockMessage> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn find_messages_by_topic(&self, topic: &str) -> Vec<MockMessage> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter(|msg| msg.topic == topic)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.delivered.lock().unwrap().clear();
    }
}

impl Default for MockMqttFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Payloads conformes à ce que publient les appareils Shelly
pub struct ShellyMessageBuilder;

impl ShellyMessageBuilder {
    pub fn ht_info_topic(id: &str) -> String {
        format!("shellies/shellyht-{id}/info")
    }

    /// Rapport `/info` d'un H&T gen1
    pub fn ht_info(mac: &str, t_c: f64, t_f: f64, humidity: f64, battery_pct: i64, battery_v: f64) -> Value {
        serde_json::json!({
            "wifi_sta": {"connected": true, "ssid": "home", "rssi": -60},
            "mac": mac,
            "is_valid": true,
            "tmp": {"value": t_c, "units": "C", "tC": t_c, "tF": t_f, "is_valid": true},
            "hum": {"value": humidity, "is_valid": true},
            "bat": {"value": battery_pct, "voltage": battery_v},
            "act_reasons": ["sensor"]
        })
    }

    pub fn htgen3_rpc_topic(src: &str) -> String {
        format!("{src}/events/rpc")
    }

    /// Notification `NotifyFullStatus` d'un H&T Gen3
    pub fn htgen3_full_status(src: &str, t_c: f64, t_f: f64, rh: f64, battery_pct: i64, battery_v: f64) -> Value {
        serde_json::json!({
            "src": src,
            "dst": format!("{src}/events"),
            "method": "NotifyFullStatus",
            "params": {
                "ts": 1712345678.12,
                "devicepower:0": {"id": 0, "battery": {"V": battery_v, "percent": battery_pct}, "external": {"present": false}},
                "humidity:0": {"id": 0, "rh": rh},
                "temperature:0": {"id": 0, "tC": t_c, "tF": t_f},
                "sys": {"mac": src.trim_start_matches("shellyhtg3-").to_uppercase(), "uptime": 1, "wakeup_period": 7200}
            }
        })
    }

    /// Notification partielle, ignorée par l'exporter
    pub fn htgen3_status(src: &str, t_c: f64) -> Value {
        serde_json::json!({
            "src": src,
            "dst": format!("{src}/events"),
            "method": "NotifyStatus",
            "params": {"ts": 1712345679.0, "temperature:0": {"id": 0, "tC": t_c}}
        })
    }

    /// `shellies/shellyem3-<device>/emeter/<phase>/<measurement>`
    pub fn em3_topic(device: &str, phase: u8, measurement: &str) -> String {
        format!("shellies/shellyem3-{device}/emeter/{phase}/{measurement}")
    }
}
