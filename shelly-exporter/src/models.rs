use std::fmt;

/// Une livraison du transport : topic hiérarchique + payload brut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telemetry {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl Telemetry {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self { topic: topic.into(), payload: payload.into() }
    }

    pub fn payload_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

impl fmt::Display for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.topic, self.payload_lossy())
    }
}

/// Sortie d'un scrape pour un collector : échantillons + indicateur de vivacité
#[derive(Debug, Clone, PartialEq)]
pub struct Scrape {
    pub samples: Vec<Sample>,
    pub up: Sample,
}

/// (nom de métrique, labels, valeur)
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub family: &'static str,
    pub labels: Vec<(&'static str, String)>,
    pub value: f64,
}

impl Sample {
    pub fn new(family: &'static str, value: f64) -> Self {
        Self { family, labels: Vec::new(), value }
    }

    pub fn label(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.labels.push((key, value.into()));
        self
    }

    pub fn label_value(&self, key: &str) -> Option<&str> {
        self.labels.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }
}

/// Description fixe d'une famille de métriques
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilySpec {
    pub name: &'static str,
    pub help: &'static str,
    pub label_keys: &'static [&'static str],
}
