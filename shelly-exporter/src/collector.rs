/**
 * COLLECTORS - machinerie partagée par toutes les classes d'appareils
 *
 * RÔLE :
 * Une classe d'appareil fournit un schéma (filtre d'ingestion + mapping en
 * échantillons). Le collector générique associé fournit l'unité d'agrégation,
 * la politique d'écrasement et le snapshot.
 *
 * FORMES :
 * - ReportCollector<S> : dernier message complet (LatestSlot), relu à chaque scrape
 * - ScalarCollector<S> : map topic -> valeur (DrainMap), drainée à chaque scrape
 */

use crate::decode::decode_scalar;
use crate::error::{DecodeError, ScrapeError};
use crate::liveness::Liveness;
use crate::models::{FamilySpec, Sample, Telemetry};
use crate::state::{DrainMap, LatestSlot};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Résultat de l'application d'un message à un collector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    Stored,
    Ignored,
    Dropped,
}

/// Vue figée de l'état, capturée au début d'un scrape
#[derive(Debug, Clone)]
pub enum Snapshot {
    Empty,
    Report(Arc<Telemetry>),
    Scalars(Vec<(String, f64)>),
}

pub trait Collector: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Familles de données, sans la famille `*_up`.
    fn families(&self) -> &'static [FamilySpec];

    fn liveness(&self) -> Liveness;

    /// Applique un message : stocke, ignore (topic étranger) ou jette (payload invalide).
    fn ingest(&self, msg: &Telemetry) -> Ingest;

    /// Capture atomique ; pour la forme scalaire c'est un drain, pas une lecture.
    fn snapshot(&self) -> Snapshot;

    /// Décodage + mapping d'un snapshot, sans effet sur l'état.
    fn render(&self, snapshot: Snapshot) -> Result<Vec<Sample>, ScrapeError>;

    /// Rend un snapshot dont le scrape a échoué, pour le prochain cycle.
    /// Rien à faire quand le snapshot n'a rien retiré de l'état.
    fn restore(&self, _snapshot: Snapshot) {}
}

/// Classe d'appareil qui émet un rapport complet par événement.
pub trait ReportSchema: Send + Sync + 'static {
    const NAME: &'static str;
    const FAMILIES: &'static [FamilySpec];
    const UP: Liveness;

    fn accepts(msg: &Telemetry) -> bool;

    fn map(msg: &Telemetry) -> Result<Vec<Sample>, DecodeError>;
}

/// Classe d'appareil qui émet un message par mesure.
pub trait ScalarSchema: Send + Sync + 'static {
    const NAME: &'static str;
    const FAMILIES: &'static [FamilySpec];
    const UP: Liveness;

    fn accepts(topic: &str) -> bool;

    /// `None` si le topic ne correspond à aucune mesure connue.
    fn map(topic: &str, value: f64) -> Option<Sample>;
}

pub struct ReportCollector<S> {
    last: LatestSlot<Telemetry>,
    _schema: PhantomData<S>,
}

impl<S: ReportSchema> ReportCollector<S> {
    pub fn new() -> Self {
        Self { last: LatestSlot::new(), _schema: PhantomData }
    }
}

impl<S: ReportSchema> Default for ReportCollector<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ReportSchema> Collector for ReportCollector<S> {
    fn name(&self) -> &'static str {
        S::NAME
    }

    fn families(&self) -> &'static [FamilySpec] {
        S::FAMILIES
    }

    fn liveness(&self) -> Liveness {
        S::UP
    }

    fn ingest(&self, msg: &Telemetry) -> Ingest {
        if !S::accepts(msg) {
            return Ingest::Ignored;
        }
        debug!(collector = S::NAME, topic = %msg.topic, length = msg.payload.len(), "message from mqtt");
        self.last.store(msg.clone());
        Ingest::Stored
    }

    fn snapshot(&self) -> Snapshot {
        match self.last.load() {
            Some(msg) => Snapshot::Report(msg),
            None => Snapshot::Empty,
        }
    }

    fn render(&self, snapshot: Snapshot) -> Result<Vec<Sample>, ScrapeError> {
        match snapshot {
            Snapshot::Empty => Ok(Vec::new()),
            Snapshot::Report(msg) => Ok(S::map(&msg)?),
            Snapshot::Scalars(_) => Err(ScrapeError::Worker(format!("{}: unexpected scalar snapshot", S::NAME))),
        }
    }
}

pub struct ScalarCollector<S> {
    values: DrainMap<f64>,
    _schema: PhantomData<S>,
}

impl<S: ScalarSchema> ScalarCollector<S> {
    pub fn new() -> Self {
        Self { values: DrainMap::new(), _schema: PhantomData }
    }
}

impl<S: ScalarSchema> Default for ScalarCollector<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ScalarSchema> Collector for ScalarCollector<S> {
    fn name(&self) -> &'static str {
        S::NAME
    }

    fn families(&self) -> &'static [FamilySpec] {
        S::FAMILIES
    }

    fn liveness(&self) -> Liveness {
        S::UP
    }

    fn ingest(&self, msg: &Telemetry) -> Ingest {
        if !S::accepts(&msg.topic) {
            return Ingest::Ignored;
        }
        match decode_scalar(&msg.payload) {
            Ok(value) => {
                self.values.insert(msg.topic.as_str(), value);
                Ingest::Stored
            }
            Err(e) => {
                error!(collector = S::NAME, topic = %msg.topic, error = %e, "failed to parse payload");
                Ingest::Dropped
            }
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::Scalars(self.values.drain())
    }

    fn restore(&self, snapshot: Snapshot) {
        if let Snapshot::Scalars(entries) = snapshot {
            self.values.restore(entries);
        }
    }

    fn render(&self, snapshot: Snapshot) -> Result<Vec<Sample>, ScrapeError> {
        let entries = match snapshot {
            Snapshot::Empty => return Ok(Vec::new()),
            Snapshot::Scalars(entries) => entries,
            Snapshot::Report(_) => {
                return Err(ScrapeError::Worker(format!("{}: unexpected report snapshot", S::NAME)))
            }
        };

        let mut samples = Vec::with_capacity(entries.len());
        for (topic, value) in entries {
            match S::map(&topic, value) {
                Some(sample) => samples.push(sample),
                None => warn!(collector = S::NAME, topic = %topic, value, "unhandled topic"),
            }
        }
        Ok(samples)
    }
}
