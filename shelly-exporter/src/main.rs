/**
 * SHELLY EXPORTER - point d'entrée
 *
 * MODES :
 * - prom (défaut) : MQTT -> Engine -> HTTP /metrics
 * - debug : affiche chaque message reçu sur les topics configurés
 *
 * Configuration : exporter.yaml (ou $SHELLY_EXPORTER_CONFIG) + variables
 * d'environnement (.env chargé si présent).
 */

use anyhow::{bail, Context, Result};
use shelly_exporter::config::{load_config, ExporterConfig, LogFormat};
use shelly_exporter::http::{self, AppState};
use shelly_exporter::mqtt::{self, Sink};
use shelly_exporter::Engine;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "shelly-exporter - Converts received data from MQTT towards prometheus format

USAGE:
  shelly-exporter [prom]   forwards the mqtt data towards prometheus
  shelly-exporter debug    inspect topics and their data
";

enum Mode {
    Prom,
    Debug,
}

fn parse_mode(args: &[String]) -> Result<Option<Mode>> {
    match args.first().map(String::as_str) {
        None | Some("prom") => Ok(Some(Mode::Prom)),
        Some("debug") => Ok(Some(Mode::Debug)),
        Some("-h") | Some("--help") | Some("help") => Ok(None),
        Some(other) => bail!("unknown command {other:?}\n\n{USAGE}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Ok si .env n'existe pas

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(mode) = parse_mode(&args)? else {
        print!("{USAGE}");
        return Ok(());
    };

    let (cfg, source) = load_config().await.context("invalid configuration")?;
    init_logging(&cfg);
    info!(%source, "configuration loaded");

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
            }
            shutdown.cancel();
        });
    }

    match mode {
        Mode::Prom => run_prom(cfg, shutdown).await,
        Mode::Debug => run_debug(cfg, shutdown).await,
    }
}

fn init_logging(cfg: &ExporterConfig) {
    let default_level = if cfg.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match cfg.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn run_prom(cfg: ExporterConfig, shutdown: CancellationToken) -> Result<()> {
    let engine = Arc::new(Engine::standard(cfg.scrape_timeout()));
    let (tx, rx) = mpsc::channel(cfg.queue_capacity.max(1));

    let ingestion = engine.spawn_ingestion(rx, shutdown.clone());
    let listener = mqtt::spawn_mqtt_listener(
        mqtt::mqtt_options(&cfg)?,
        cfg.topics.clone(),
        Sink::Queue(tx),
        shutdown.clone(),
    );

    let app_state = AppState {
        engine,
        metrics_path: cfg.http.metrics_path.clone(),
        exporter_metrics: cfg.enable_exporter_metrics,
    };
    let served = http::serve(cfg.listen_addr()?, app_state, shutdown.clone()).await;
    shutdown.cancel();

    if let Err(e) = listener.await {
        error!(error = %e, "MQTT listener task failed");
    }
    let stats = ingestion.await.context("ingestion task failed")?;
    info!(?stats, "exporter stopped");

    served.context("ListenAndServe failed")
}

async fn run_debug(cfg: ExporterConfig, shutdown: CancellationToken) -> Result<()> {
    println!("blocking and waiting for messages");
    let listener = mqtt::spawn_mqtt_listener(mqtt::mqtt_options(&cfg)?, cfg.topics.clone(), Sink::Stdout, shutdown);
    listener.await.context("MQTT listener task failed")?;
    Ok(())
}
