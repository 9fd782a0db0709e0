use {
    crate::{config::Broker, sensors::Measurement},
    anyhow::{Context, Result},
    async_channel::Receiver,
    chrono::{DateTime, Utc},
    log::{info, warn},
    rumqttc::{
        AsyncClient, ClientError, Event, EventLoop, MqttOptions, Packet, QoS, TlsConfiguration,
        Transport,
    },
    serde::Serialize,
    std::{fs, path::Path, time::Duration},
    tokio::{task::JoinHandle, time},
};

const KEEP_ALIVE: Duration = Duration::from_secs(5);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// JSON document sent for every measurement.
#[derive(Debug, Serialize)]
pub struct Payload<'a> {
    #[serde(rename = "deviceId")]
    pub device_id: &'a str,
    pub date: DateTime<Utc>,
    #[serde(rename = "CO2")]
    pub co2: u16,
    #[serde(rename = "TVOC")]
    pub tvoc: u16,
}

impl<'a> Payload<'a> {
    pub fn new(device_id: &'a str, measurement: &Measurement) -> Self {
        Self {
            device_id,
            date: measurement.timestamp,
            co2: measurement.co2_ppm,
            tvoc: measurement.tvoc_ppb,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to queue publish request: {0}")]
    Client(#[from] ClientError),
}

pub fn mqtt_options(broker: &Broker) -> Result<MqttOptions> {
    let mut options = MqttOptions::new(&broker.client_name, &broker.host, broker.port);
    options.set_keep_alive(KEEP_ALIVE);

    if let Some(tls) = &broker.tls {
        let ca = read_file(&tls.root_ca)?;
        let client_auth = match (&tls.certificate, &tls.private_key) {
            (Some(certificate), Some(key)) => Some((read_file(certificate)?, read_file(key)?)),
            _ => None,
        };

        options.set_transport(Transport::tls_with_config(TlsConfiguration::Simple {
            ca,
            alpn: None,
            client_auth,
        }));
    }

    if let Some(credentials) = &broker.credentials {
        options.set_credentials(&credentials.username, &credentials.password);
    }

    Ok(options)
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Sends queued measurements to the broker.
pub struct Publisher {
    client: AsyncClient,
    topic: String,
    device_id: String,
}

impl Publisher {
    pub fn new(client: AsyncClient, topic: String, device_id: String) -> Self {
        Self {
            client,
            topic,
            device_id,
        }
    }

    pub async fn publish(&self, measurement: &Measurement) -> Result<(), PublishError> {
        let payload = Payload::new(&self.device_id, measurement).to_json()?;
        self.client
            .publish(&self.topic, QoS::AtLeastOnce, false, payload)
            .await?;
        Ok(())
    }

    /// Drains the queue until it is closed and empty. Failed publishes are
    /// logged and skipped.
    pub async fn run(self, queue: Receiver<Measurement>) {
        while let Ok(measurement) = queue.recv().await {
            if let Err(e) = self.publish(&measurement).await {
                warn!("{}", e);
            }
        }
        info!("Publish queue closed");
    }
}

/// Drives the MQTT connection. Errors are logged and the connection retried,
/// rumqttc reconnects on the next poll.
pub async fn connection(
    mut eventloop: EventLoop,
    client: AsyncClient,
    subscription: Option<String>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("MQTT connected");
                if let Some(topic) = &subscription {
                    match client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                        Ok(()) => info!("Subscribed to topic: {}", topic),
                        Err(e) => warn!("Failed to subscribe to {}: {}", topic, e),
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                info!(
                    "{}: {}",
                    publish.topic,
                    String::from_utf8_lossy(&publish.payload)
                );
            }
            Ok(_) => {}
            Err(e) => {
                warn!("MQTT connection error: {}", e);
                time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

/// Gives the publisher up to `drain` to empty the queue, then closes the
/// connection. Returns whether the queue was drained.
///
/// Nothing here waits on the request channel, it stays full for as long as
/// the broker is unreachable.
pub async fn close(
    mqtt: &AsyncClient,
    mut publisher: JoinHandle<()>,
    connection: JoinHandle<()>,
    drain: Duration,
) -> bool {
    let drained = time::timeout(drain, &mut publisher).await.is_ok();
    if !drained {
        warn!("Publish queue not drained, dropping remaining measurements");
        publisher.abort();
    }

    if let Err(e) = mqtt.try_disconnect() {
        warn!("MQTT disconnect failed: {}", e);
    }
    connection.abort();

    drained
}
