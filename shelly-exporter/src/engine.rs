/**
 * ENGINE - propriétaire de l'état d'agrégation de toutes les classes d'appareils
 *
 * FONCTIONNEMENT :
 * - Une seule tâche d'ingestion consomme la file (topic, payload) et propose
 *   chaque message à chaque collector
 * - Un scrape capture le snapshot de chaque collector puis décode/mappe sous timeout
 * - Pas d'état global : l'Engine est partagé par Arc entre ingestion et HTTP
 */

use crate::collector::{Collector, Ingest};
use crate::devices::{ht::HtCollector, htgen3::HtGen3Collector, threeem::ThreeEmCollector};
use crate::error::ExpositionError;
use crate::liveness::observe;
use crate::models::{Scrape, Telemetry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Compteurs de la tâche d'ingestion, rendus à sa terminaison
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub received: u64,
    pub stored: u64,
    pub ignored: u64,
    pub dropped: u64,
}

pub struct Engine {
    collectors: Vec<Arc<dyn Collector>>,
    scrape_timeout: Duration,
}

impl Engine {
    pub fn new(scrape_timeout: Duration) -> Self {
        Self { collectors: Vec::new(), scrape_timeout }
    }

    /// Les trois classes connues : H&T, H&T Gen3, 3EM.
    pub fn standard(scrape_timeout: Duration) -> Self {
        Self::new(scrape_timeout)
            .with_collector(HtCollector::new())
            .with_collector(HtGen3Collector::new())
            .with_collector(ThreeEmCollector::new())
    }

    pub fn with_collector<C: Collector>(mut self, collector: C) -> Self {
        self.collectors.push(Arc::new(collector));
        self
    }

    pub fn collectors(&self) -> &[Arc<dyn Collector>] {
        &self.collectors
    }

    pub fn scrape_timeout(&self) -> Duration {
        self.scrape_timeout
    }

    /// Applique un message à tous les collectors ; un message peut intéresser plusieurs classes.
    pub fn apply(&self, msg: &Telemetry, stats: &mut IngestStats) {
        stats.received += 1;
        let mut stored = false;
        let mut dropped = false;
        for c in &self.collectors {
            match c.ingest(msg) {
                Ingest::Stored => stored = true,
                Ingest::Dropped => dropped = true,
                Ingest::Ignored => {}
            }
        }
        match (stored, dropped) {
            (true, _) => stats.stored += 1,
            (false, true) => stats.dropped += 1,
            (false, false) => stats.ignored += 1,
        }
    }

    /// Démarre la tâche consommatrice. Elle se termine proprement quand la file
    /// est fermée ou que le token est annulé ; aucun verrou n'est tenu entre deux `.await`.
    pub fn spawn_ingestion(
        self: &Arc<Self>,
        mut rx: mpsc::Receiver<Telemetry>,
        shutdown: CancellationToken,
    ) -> JoinHandle<IngestStats> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut stats = IngestStats::default();
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        info!(received = stats.received, "ingestion cancelled");
                        break;
                    }
                    msg = rx.recv() => match msg {
                        Some(msg) => engine.apply(&msg, &mut stats),
                        None => {
                            info!(received = stats.received, "ingestion queue closed");
                            break;
                        }
                    }
                }
            }
            debug!(?stats, "ingestion task finished");
            stats
        })
    }

    /// Un `Scrape` par collector, dans l'ordre d'enregistrement. Peut être appelé
    /// en parallèle de l'ingestion et d'autres scrapes.
    pub async fn scrape(&self) -> Vec<Scrape> {
        let mut out = Vec::with_capacity(self.collectors.len());
        for c in &self.collectors {
            out.push(observe(c.clone(), self.scrape_timeout).await);
        }
        out
    }

    /// Scrape complet rendu au format texte Prometheus.
    pub async fn render(&self) -> Result<String, ExpositionError> {
        let scrapes = self.scrape().await;
        crate::exposition::encode(&self.collectors, &scrapes)
    }
}
