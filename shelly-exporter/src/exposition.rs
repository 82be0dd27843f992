//! Prometheus text exposition of a scrape.
//!
//! Each call builds a throw-away `Registry` with one `GaugeVec` per family
//! that has samples, so nothing survives between scrapes except what the
//! collectors themselves retain.

use crate::collector::Collector;
use crate::error::ExpositionError;
use crate::models::{FamilySpec, Sample, Scrape};
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::warn;

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub fn encode(collectors: &[Arc<dyn Collector>], scrapes: &[Scrape]) -> Result<String, ExpositionError> {
    encode_into(Registry::new(), collectors, scrapes)
}

/// Comme `encode`, mais dans un registry déjà garni (ex: métriques process).
pub fn encode_into(
    registry: Registry,
    collectors: &[Arc<dyn Collector>],
    scrapes: &[Scrape],
) -> Result<String, ExpositionError> {
    let mut specs: BTreeMap<&'static str, FamilySpec> = BTreeMap::new();
    for c in collectors {
        for f in c.families() {
            specs.insert(f.name, *f);
        }
        let up = c.liveness().family;
        specs.insert(up.name, up);
    }

    let mut grouped: BTreeMap<&'static str, Vec<&Sample>> = BTreeMap::new();
    for scrape in scrapes {
        for s in scrape.samples.iter().chain(std::iter::once(&scrape.up)) {
            grouped.entry(s.family).or_default().push(s);
        }
    }

    for (name, samples) in grouped {
        let Some(spec) = specs.get(name) else {
            warn!(family = name, "sample for an undeclared metric family, skipped");
            continue;
        };
        let vec = GaugeVec::new(Opts::new(spec.name, spec.help), spec.label_keys)?;
        fill_family(&vec, spec, &samples);
        registry.register(Box::new(vec))?;
    }

    let mut buf = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buf)?;
    Ok(String::from_utf8(buf)?)
}

/// Pose chaque échantillon dans sa série ; renvoie le nombre de séries écrasées
/// (deux topics distincts qui donnent le même jeu de labels).
fn fill_family(vec: &GaugeVec, spec: &FamilySpec, samples: &[&Sample]) -> usize {
    let mut seen: HashSet<Vec<&str>> = HashSet::with_capacity(samples.len());
    let mut collisions = 0;
    for s in samples {
        let values: Vec<&str> = spec
            .label_keys
            .iter()
            .map(|k| s.label_value(k).unwrap_or(""))
            .collect();
        vec.with_label_values(&values).set(s.value);
        if !seen.insert(values) {
            collisions += 1;
            warn!(family = spec.name, labels = ?s.labels, value = s.value, "duplicate series, previous value overwritten");
        }
    }
    collisions
}

/// Registry avec les métriques du process exporter (Linux uniquement).
pub fn process_registry() -> Result<Registry, ExpositionError> {
    let registry = Registry::new();
    #[cfg(target_os = "linux")]
    registry.register(Box::new(prometheus::process_collector::ProcessCollector::for_self()))?;
    Ok(registry)
}
