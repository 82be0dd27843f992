use crate::collector::Collector;
use crate::error::ScrapeError;
use crate::models::{FamilySpec, Sample, Scrape};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

pub const UP_HELP: &str = "Whether scrape was successful";

/// Famille `*_up` d'un collector ; le label porte le texte d'erreur en cas d'échec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    pub family: FamilySpec,
}

impl Liveness {
    pub const fn new(name: &'static str, label_keys: &'static [&'static str]) -> Self {
        Self { family: FamilySpec { name, help: UP_HELP, label_keys } }
    }

    pub fn label_key(&self) -> &'static str {
        self.family.label_keys.first().copied().unwrap_or("status")
    }

    pub fn success(&self) -> Sample {
        Sample::new(self.family.name, 1.0).label(self.label_key(), "")
    }

    pub fn failure(&self, err: &ScrapeError) -> Sample {
        Sample::new(self.family.name, 0.0).label(self.label_key(), err.to_string())
    }
}

/// Un cycle complet pour un collector : snapshot, puis décodage + mapping
/// borné par `limit` sur le pool bloquant. Ne renvoie jamais d'erreur : un
/// échec devient un échantillon `*_up` à 0.
pub async fn observe(collector: Arc<dyn Collector>, limit: Duration) -> Scrape {
    let liveness = collector.liveness();
    let snapshot = collector.snapshot();

    // copie gardée pour réinjecter un drain si le scrape échoue
    let retained = snapshot.clone();
    let worker = {
        let collector = collector.clone();
        tokio::task::spawn_blocking(move || collector.render(snapshot))
    };

    let outcome = match tokio::time::timeout(limit, worker).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(ScrapeError::Worker(join.to_string())),
        Err(_) => Err(ScrapeError::Timeout(limit)),
    };

    match outcome {
        Ok(samples) => Scrape { samples, up: liveness.success() },
        Err(e) => {
            error!(collector = collector.name(), error = %e, "Scrape failed");
            collector.restore(retained);
            Scrape { samples: Vec::new(), up: liveness.failure(&e) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{Ingest, ScalarCollector, ScalarSchema, Snapshot};
    use crate::models::Telemetry;

    const SLOW_UP: Liveness = Liveness::new("slow_up", &["status"]);

    struct Slow;

    impl Collector for Slow {
        fn name(&self) -> &'static str {
            "slow"
        }
        fn families(&self) -> &'static [FamilySpec] {
            &[]
        }
        fn liveness(&self) -> Liveness {
            SLOW_UP
        }
        fn ingest(&self, _msg: &Telemetry) -> Ingest {
            Ingest::Ignored
        }
        fn snapshot(&self) -> Snapshot {
            Snapshot::Empty
        }
        fn render(&self, _snapshot: Snapshot) -> Result<Vec<Sample>, ScrapeError> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(vec![Sample::new("slow_value", 1.0)])
        }
    }

    /// Mesures scalaires dont le mapping est lent
    struct SlowScalars;

    impl ScalarSchema for SlowScalars {
        const NAME: &'static str = "slow_scalars";
        const FAMILIES: &'static [FamilySpec] = &[];
        const UP: Liveness = Liveness::new("slow_scalars_up", &["last_error"]);

        fn accepts(_topic: &str) -> bool {
            true
        }

        fn map(_topic: &str, value: f64) -> Option<Sample> {
            std::thread::sleep(Duration::from_millis(200));
            Some(Sample::new("slow_scalars_value", value))
        }
    }

    #[test]
    fn test_success_and_failure_samples() {
        let ok = SLOW_UP.success();
        assert_eq!(ok.value, 1.0);
        assert_eq!(ok.label_value("status"), Some(""));

        let ko = SLOW_UP.failure(&ScrapeError::Worker("boom".into()));
        assert_eq!(ko.value, 0.0);
        assert_eq!(ko.label_value("status"), Some("collect: worker failed: boom"));
    }

    #[tokio::test]
    async fn test_timeout_is_reported_as_failure() {
        let scrape = observe(Arc::new(Slow), Duration::from_millis(20)).await;
        assert!(scrape.samples.is_empty());
        assert_eq!(scrape.up.value, 0.0);
        assert!(scrape.up.label_value("status").unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_within_limit_is_success() {
        let scrape = observe(Arc::new(Slow), Duration::from_secs(5)).await;
        assert_eq!(scrape.samples.len(), 1);
        assert_eq!(scrape.up.value, 1.0);
    }

    #[tokio::test]
    async fn test_timed_out_drain_is_served_by_next_scrape() {
        let collector = Arc::new(ScalarCollector::<SlowScalars>::new());
        collector.ingest(&Telemetry::new("a/b/c/0/v", "7"));

        let failed = observe(collector.clone(), Duration::from_millis(20)).await;
        assert!(failed.samples.is_empty());
        assert_eq!(failed.up.label_value("last_error"), Some("collect: timed out after 20ms"));

        let next = observe(collector.clone(), Duration::from_secs(5)).await;
        assert_eq!(next.up.value, 1.0);
        assert_eq!(next.samples, vec![Sample::new("slow_scalars_value", 7.0)]);
    }

    #[tokio::test]
    async fn test_restored_drain_does_not_shadow_newer_value() {
        let collector = Arc::new(ScalarCollector::<SlowScalars>::new());
        collector.ingest(&Telemetry::new("a/b/c/0/v", "7"));
        observe(collector.clone(), Duration::from_millis(20)).await;

        collector.ingest(&Telemetry::new("a/b/c/0/v", "8"));
        let next = observe(collector.clone(), Duration::from_secs(5)).await;
        assert_eq!(next.samples, vec![Sample::new("slow_scalars_value", 8.0)]);
    }
}
