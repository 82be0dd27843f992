use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ExporterConfig {
    pub mqtt: MqttConf,
    pub topics: Vec<String>,
    pub http: HttpConf,
    pub scrape_timeout_secs: u64,
    pub queue_capacity: usize,
    pub verbose: bool,
    pub enable_exporter_metrics: bool,
    pub log_format: LogFormat,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MqttConf {
    pub urls: Vec<String>, // ex: "mqtt://192.168.1.10:1883"
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub keep_alive_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HttpConf {
    pub listen_address: String, // ":80" accepté, comme "0.0.0.0:80"
    pub metrics_path: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Broker extrait d'une URL `mqtt://host:port`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broker {
    pub host: String,
    pub port: u16,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttConf::default(),
            topics: vec!["shellies/+/info".into()],
            http: HttpConf::default(),
            scrape_timeout_secs: 60,
            queue_capacity: 256,
            verbose: false,
            enable_exporter_metrics: false,
            log_format: LogFormat::Text,
        }
    }
}

impl Default for MqttConf {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            username: None,
            password: None,
            client_id: "shelly-exporter".into(),
            keep_alive_secs: 15,
        }
    }
}

impl Default for HttpConf {
    fn default() -> Self {
        Self { listen_address: ":80".into(), metrics_path: "/metrics".into() }
    }
}

impl ExporterConfig {
    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout_secs)
    }

    /// Les variables d'environnement priment sur le fichier.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(hosts) = lookup("MQTT_HOSTS") {
            self.mqtt.urls = hosts
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(user) = lookup("MQTT_USERNAME") {
            self.mqtt.username = Some(user).filter(|u| !u.is_empty());
        }
        if let Some(pass) = lookup("MQTT_PASSWORD") {
            self.mqtt.password = Some(pass).filter(|p| !p.is_empty());
        }
        if let Some(addr) = lookup("HTTP_LISTEN_ADDRESS") {
            self.http.listen_address = addr;
        }
    }

    /// Erreurs de configuration = erreurs de programmation : le démarrage s'arrête.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.broker()?;
        if self.topics.is_empty() {
            return Err(ConfigError::NoTopics);
        }
        // un seul filtre invalide fait rejeter tout le SUBSCRIBE
        if let Some(bad) = self.topics.iter().find(|t| t.trim().is_empty()) {
            return Err(ConfigError::InvalidTopic(bad.clone()));
        }
        if self.scrape_timeout_secs == 0 {
            return Err(ConfigError::InvalidScrapeTimeout);
        }
        self.listen_addr()?;
        let path = self.http.metrics_path.as_str();
        let reserved = path.contains([':', '*', '{', '}']);
        if !path.starts_with('/') || path == "/" || path == "/health" || reserved {
            return Err(ConfigError::InvalidMetricsPath(self.http.metrics_path.clone()));
        }
        Ok(())
    }

    /// Premier broker de la liste ; le client MQTT ne gère qu'un serveur à la fois.
    pub fn broker(&self) -> Result<Broker, ConfigError> {
        let url = self.mqtt.urls.first().ok_or(ConfigError::NoBroker)?;
        parse_broker_url(url)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = self.http.listen_address.trim();
        let full = if raw.starts_with(':') { format!("0.0.0.0{raw}") } else { raw.to_string() };
        full.parse()
            .map_err(|_| ConfigError::InvalidListenAddress(self.http.listen_address.clone()))
    }
}

pub fn parse_broker_url(url: &str) -> Result<Broker, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidBrokerUrl { url: url.to_string(), reason: reason.to_string() };

    let rest = ["mqtt://", "tcp://"]
        .iter()
        .find_map(|scheme| url.strip_prefix(scheme))
        .ok_or_else(|| invalid("expected mqtt:// or tcp:// scheme"))?;
    let rest = rest.trim_end_matches('/');

    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid("bad port"))?),
        None => (rest, 1883),
    };
    if host.is_empty() {
        return Err(invalid("missing host"));
    }
    Ok(Broker { host: host.to_string(), port })
}

/// Origine de la configuration ; journalisée par l'appelant une fois le logging prêt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults(PathBuf),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults(path) => write!(f, "defaults (no {})", path.display()),
        }
    }
}

pub async fn load_config() -> Result<(ExporterConfig, ConfigSource), ConfigError> {
    let path = std::env::var("SHELLY_EXPORTER_CONFIG").unwrap_or_else(|_| "exporter.yaml".into());
    load_config_with(PathBuf::from(path), |key| std::env::var(key).ok()).await
}

/// Fichier + surcharges d'environnement + validation.
pub async fn load_config_with<F>(path: PathBuf, lookup: F) -> Result<(ExporterConfig, ConfigSource), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let source = if path.exists() { ConfigSource::File(path) } else { ConfigSource::Defaults(path) };
    let mut cfg = match &source {
        ConfigSource::File(path) => load_config_file(path).await?,
        ConfigSource::Defaults(_) => ExporterConfig::default(),
    };
    cfg.apply_env(lookup);
    cfg.validate()?;
    Ok((cfg, source))
}

pub async fn load_config_file<P: AsRef<Path>>(path: P) -> Result<ExporterConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(ExporterConfig::default());
    }
    let txt = fs::read_to_string(path).await?;
    if txt.trim().is_empty() {
        return Ok(ExporterConfig::default());
    }
    Ok(serde_yaml::from_str(&txt)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn valid() -> ExporterConfig {
        let mut cfg = ExporterConfig::default();
        cfg.mqtt.urls = vec!["mqtt://10.0.0.2:1883".into()];
        cfg
    }

    #[test]
    fn test_defaults() {
        let cfg = ExporterConfig::default();
        assert_eq!(cfg.topics, vec!["shellies/+/info"]);
        assert_eq!(cfg.http.metrics_path, "/metrics");
        assert_eq!(cfg.scrape_timeout(), Duration::from_secs(60));
        assert!(matches!(cfg.validate(), Err(ConfigError::NoBroker)));
    }

    #[test]
    fn test_parse_broker_url() {
        assert_eq!(parse_broker_url("mqtt://broker:1884").unwrap(), Broker { host: "broker".into(), port: 1884 });
        assert_eq!(parse_broker_url("tcp://10.0.0.2").unwrap().port, 1883);
        assert!(parse_broker_url("http://broker:1883").is_err());
        assert!(parse_broker_url("mqtt://broker:port").is_err());
        assert!(parse_broker_url("mqtt://:1883").is_err());
    }

    #[test]
    fn test_listen_address_go_style() {
        let cfg = valid();
        assert_eq!(cfg.listen_addr().unwrap(), "0.0.0.0:80".parse::<SocketAddr>().unwrap());

        let mut bad = valid();
        bad.http.listen_address = "nowhere".into();
        assert!(matches!(bad.validate(), Err(ConfigError::InvalidListenAddress(_))));
    }

    #[test]
    fn test_metrics_path_must_not_shadow_other_routes() {
        for path in ["metrics", "/", "/health", "/:scope", "/metrics/*rest", "/{id}"] {
            let mut cfg = valid();
            cfg.http.metrics_path = path.into();
            assert!(matches!(cfg.validate(), Err(ConfigError::InvalidMetricsPath(_))), "{path}");
        }
    }

    #[test]
    fn test_blank_topic_in_list_is_rejected() {
        let mut cfg = valid();
        cfg.topics = vec!["shellies/#".into(), " ".into()];
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidTopic(_))));

        cfg.topics.clear();
        assert!(matches!(cfg.validate(), Err(ConfigError::NoTopics)));
    }

    #[test]
    fn test_zero_scrape_timeout_is_rejected() {
        let mut cfg = valid();
        cfg.scrape_timeout_secs = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidScrapeTimeout)));
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("MQTT_HOSTS", "mqtt://a:1883, mqtt://b:1883"),
            ("MQTT_USERNAME", "shelly"),
            ("MQTT_PASSWORD", ""),
            ("HTTP_LISTEN_ADDRESS", ":9784"),
        ]);
        let mut cfg = ExporterConfig::default();
        cfg.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.mqtt.urls, vec!["mqtt://a:1883", "mqtt://b:1883"]);
        assert_eq!(cfg.mqtt.username.as_deref(), Some("shelly"));
        assert_eq!(cfg.mqtt.password, None);
        assert_eq!(cfg.listen_addr().unwrap().port(), 9784);
        assert_eq!(cfg.broker().unwrap().host, "a");
    }

    #[test]
    fn test_yaml_partial_config() {
        let cfg: ExporterConfig = serde_yaml::from_str(
            "mqtt:\n  urls: [\"mqtt://broker:1883\"]\ntopics:\n  - shellies/#\nlog_format: json\n",
        )
        .unwrap();
        assert_eq!(cfg.topics, vec!["shellies/#"]);
        assert_eq!(cfg.mqtt.client_id, "shelly-exporter");
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert!(cfg.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_missing_and_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = load_config_file(dir.path().join("nope.yaml")).await.unwrap();
        assert_eq!(missing, ExporterConfig::default());

        let empty = dir.path().join("empty.yaml");
        std::fs::write(&empty, "  \n").unwrap();
        assert_eq!(load_config_file(&empty).await.unwrap(), ExporterConfig::default());

        let broken = dir.path().join("broken.yaml");
        std::fs::write(&broken, "topics: [unclosed").unwrap();
        assert!(matches!(load_config_file(&broken).await, Err(ConfigError::Yaml(_))));
    }

    #[tokio::test]
    async fn test_load_reports_defaults_source_and_applies_env() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("exporter.yaml");
        let env: HashMap<&str, &str> = HashMap::from([("MQTT_HOSTS", "mqtt://broker:1883")]);

        let (cfg, source) = load_config_with(missing.clone(), |k| env.get(k).map(|v| v.to_string())).await.unwrap();
        assert_eq!(source, ConfigSource::Defaults(missing.clone()));
        assert_eq!(cfg.broker().unwrap().host, "broker");

        std::fs::write(&missing, "scrape_timeout_secs: 5\n").unwrap();
        let (cfg, source) = load_config_with(missing.clone(), |k| env.get(k).map(|v| v.to_string())).await.unwrap();
        assert_eq!(source, ConfigSource::File(missing));
        assert_eq!(cfg.scrape_timeout(), Duration::from_secs(5));
    }
}
