use std::time::Duration;

/// Payload illisible pour une classe d'appareil ; la donnée brute est gardée pour le diagnostic
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("json unmarshal failed: {source} for data: {payload:?}")]
    Json {
        #[source]
        source: serde_json::Error,
        payload: String,
    },
    #[error("failed to parse payload as number: {payload:?}")]
    Scalar { payload: String },
}

impl DecodeError {
    pub fn json(source: serde_json::Error, payload: &[u8]) -> Self {
        Self::Json { source, payload: String::from_utf8_lossy(payload).into_owned() }
    }

    pub fn scalar(payload: &[u8]) -> Self {
        Self::Scalar { payload: String::from_utf8_lossy(payload).into_owned() }
    }
}

/// Échec d'un cycle de scrape, converti en échantillon `*_up` à 0
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("collect: {0}")]
    Decode(#[from] DecodeError),
    #[error("collect: timed out after {0:?}")]
    Timeout(Duration),
    #[error("collect: worker failed: {0}")]
    Worker(String),
}

/// Configuration invalide : erreur fatale au démarrage
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to parse broker URL {url:?}: {reason}")]
    InvalidBrokerUrl { url: String, reason: String },
    #[error("no MQTT broker configured (set mqtt.urls or MQTT_HOSTS)")]
    NoBroker,
    #[error("no MQTT topic to subscribe to")]
    NoTopics,
    #[error("invalid MQTT topic filter {0:?}")]
    InvalidTopic(String),
    #[error("scrape timeout must be at least one second")]
    InvalidScrapeTimeout,
    #[error("invalid listen address {0:?}")]
    InvalidListenAddress(String),
    #[error("invalid metrics path {0:?}: must start with '/', not shadow '/' or '/health' and hold no ':', '*', '{{' or '}}'")]
    InvalidMetricsPath(String),
}

/// Erreurs d'encodage au format texte Prometheus
#[derive(Debug, thiserror::Error)]
pub enum ExpositionError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
    #[error("exposition is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
