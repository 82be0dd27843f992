/**
 * ADAPTATEUR MQTT - souscription aux topics Shelly et remplissage de la file d'ingestion
 *
 * FONCTIONNEMENT :
 * - Client rumqttc construit depuis la config (premier broker, credentials optionnels)
 * - (Re)souscription à chaque ConnAck : la session est propre, rien n'est gardé côté broker
 * - Chaque publish reçu devient un `Telemetry` poussé dans la file de l'Engine,
 *   ou est affiché sur stdout en mode debug
 */

use crate::config::ExporterConfig;
use crate::error::ConfigError;
use crate::models::Telemetry;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS, SubscribeFilter};
use std::time::Duration;
use time::macros::format_description;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Destination des messages reçus
pub enum Sink {
    Queue(mpsc::Sender<Telemetry>),
    Stdout,
}

pub fn mqtt_options(cfg: &ExporterConfig) -> Result<MqttOptions, ConfigError> {
    let broker = cfg.broker()?;
    if cfg.mqtt.urls.len() > 1 {
        warn!(used = %cfg.mqtt.urls[0], ignored = cfg.mqtt.urls.len() - 1, "only the first MQTT broker is used");
    }
    let mut opts = MqttOptions::new(cfg.mqtt.client_id.clone(), broker.host, broker.port);
    opts.set_keep_alive(Duration::from_secs(cfg.mqtt.keep_alive_secs.max(5)));
    opts.set_clean_session(true);
    if let Some(user) = &cfg.mqtt.username {
        opts.set_credentials(user.clone(), cfg.mqtt.password.clone().unwrap_or_default());
    }
    Ok(opts)
}

pub fn spawn_mqtt_listener(
    opts: MqttOptions,
    topics: Vec<String>,
    sink: Sink,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    task::spawn(async move {
        let (client, mut eventloop) = AsyncClient::new(opts, 10);
        info!(?topics, "subscribing to");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    if let Err(e) = client.try_disconnect() {
                        debug!(error = %e, "MQTT disconnect request failed");
                    }
                    break;
                }
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                        info!("connected to MQTT broker");
                        let filters = topics.iter().map(|t| SubscribeFilter::new(t.clone(), QoS::AtMostOnce));
                        if let Err(e) = client.try_subscribe_many(filters) {
                            error!(error = %e, "subscribe failed");
                        }
                    }
                    Ok(Event::Incoming(Incoming::SubAck(ack))) => {
                        info!(pkid = ack.pkid, codes = ?ack.return_codes, "subscribed");
                    }
                    Ok(Event::Incoming(Incoming::Publish(p))) => {
                        let msg = Telemetry::new(p.topic, p.payload.to_vec());
                        if !deliver(&sink, msg).await {
                            info!("ingestion queue closed, stopping MQTT listener");
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "MQTT error");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        }
    })
}

/// `false` quand la file est fermée côté consommateur.
async fn deliver(sink: &Sink, msg: Telemetry) -> bool {
    match sink {
        Sink::Queue(tx) => tx.send(msg).await.is_ok(),
        Sink::Stdout => {
            println!("{}::: message topic:: {}", debug_timestamp(OffsetDateTime::now_utc()), msg);
            true
        }
    }
}

fn debug_timestamp(at: OffsetDateTime) -> String {
    let fmt = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]");
    at.format(&fmt).unwrap_or_default()
}
