/*!
Test Harness pour l'exporter

Facilite l'écriture de scénarios de bout en bout avec:
- Engine standard (H&T, H&T Gen3, 3EM) et sa tâche d'ingestion
- Feed MQTT simulé branché sur la file
- Scrapes déterministes : la file est vidée avant chaque scrape
*/

use crate::capture::parse_capture;
use crate::mqtt_stub::MockMqttFeed;
use anyhow::Result;
use serde_json::Value;
use shelly_exporter::{Engine, IngestStats, Scrape, Telemetry};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const QUEUE_CAPACITY: usize = 64;

pub struct TestHarness {
    pub engine: Arc<Engine>,
    pub feed: MockMqttFeed,
    ingestion: Option<JoinHandle<IngestStats>>,
    shutdown: CancellationToken,
    stats: IngestStats,
}

impl TestHarness {
    /// Harness avec l'Engine standard
    pub fn new() -> Self {
        Self::with_engine(Engine::standard(Duration::from_secs(5)))
    }

    pub fn with_engine(engine: Engine) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let mut harness = Self {
            engine: Arc::new(engine),
            feed: MockMqttFeed::new(),
            ingestion: None,
            shutdown: CancellationToken::new(),
            stats: IngestStats::default(),
        };
        harness.resume();
        harness
    }

    /// Rouvre une file et relance l'ingestion sur le même Engine
    pub fn resume(&mut self) {
        if self.ingestion.is_some() {
            return;
        }
        let rx = self.feed.setup_receiver(QUEUE_CAPACITY);
        self.ingestion = Some(self.engine.spawn_ingestion(rx, self.shutdown.clone()));
    }

    pub async fn publish(&mut self, topic: &str, payload: &str) -> Result<()> {
        self.resume();
        self.feed.simulate_incoming(topic, payload).await
    }

    pub async fn publish_json(&mut self, topic: &str, payload: &Value) -> Result<()> {
        let bytes = serde_json::to_vec(payload)?;
        self.resume();
        self.feed.simulate_incoming(topic, bytes).await
    }

    /// Rejoue une capture du mode debug, dans l'ordre
    pub async fn replay(&mut self, capture: &str) -> Result<usize> {
        let messages: Vec<Telemetry> = parse_capture(capture)?;
        let count = messages.len();
        self.resume();
        for msg in messages {
            self.feed.simulate_incoming(msg.topic, msg.payload).await?;
        }
        Ok(count)
    }

    /// Ferme la file et attend que tout soit ingéré ; renvoie les compteurs cumulés
    pub async fn finish(&mut self) -> Result<IngestStats> {
        self.feed.close();
        if let Some(handle) = self.ingestion.take() {
            let stats = handle.await?;
            self.stats.received += stats.received;
            self.stats.stored += stats.stored;
            self.stats.ignored += stats.ignored;
            self.stats.dropped += stats.dropped;
        }
        Ok(self.stats)
    }

    /// Scrape après ingestion complète des messages déjà publiés
    pub async fn scrape(&mut self) -> Result<Vec<Scrape>> {
        self.finish().await?;
        Ok(self.engine.scrape().await)
    }

    pub async fn scrape_text(&mut self) -> Result<String> {
        self.finish().await?;
        Ok(self.engine.render().await?)
    }

    /// Lignes d'exposition (HELP/TYPE compris) dont la métrique commence par `prefix`
    pub fn family_lines(text: &str, prefix: &str) -> String {
        text.lines()
            .filter(|l| {
                let name = l
                    .strip_prefix("# HELP ")
                    .or_else(|| l.strip_prefix("# TYPE "))
                    .unwrap_or(l);
                name.starts_with(prefix)
            })
            .map(|l| format!("{l}\n"))
            .collect()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
