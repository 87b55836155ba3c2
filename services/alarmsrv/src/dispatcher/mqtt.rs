//! MQTT presence publisher
//!
//! Every publish opens its own short-lived session: connect, publish at QoS 1,
//! wait for the broker's acknowledgement, disconnect. Alarms are rare enough
//! that holding a connection open buys nothing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tracing::debug;

use super::MessageBus;
use crate::config::MqttSettings;
use crate::error::{AlarmSrvError, Result};

pub struct MqttBus {
    settings: MqttSettings,
    endpoint: String,
    sessions: AtomicU64,
}

impl MqttBus {
    pub fn new(settings: MqttSettings) -> Self {
        let endpoint = format!("mqtt://{}:{}", settings.host, settings.port);
        Self {
            settings,
            endpoint,
            sessions: AtomicU64::new(0),
        }
    }

    /// Client id for the next session
    ///
    /// Brokers drop an existing session when another connects with the same
    /// id, so concurrent publishes each get their own suffix.
    fn next_client_id(&self) -> String {
        let n = self.sessions.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.settings.client_id, n)
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.next_client_id(),
            &self.settings.host,
            self.settings.port,
        );
        if !self.settings.username.is_empty() {
            options.set_credentials(&self.settings.username, &self.settings.password);
        }
        options.set_keep_alive(Duration::from_secs(30));
        options.set_clean_session(true);
        options
    }
}

#[async_trait]
impl MessageBus for MqttBus {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        let (client, mut eventloop) = AsyncClient::new(self.options(), 10);

        // queued until the event loop has connected
        client
            .publish(topic, QoS::AtLeastOnce, false, payload.to_vec())
            .await?;

        let acked = tokio::time::timeout(self.settings.timeout, async {
            loop {
                match eventloop.poll().await? {
                    Event::Incoming(Packet::ConnAck(ack)) => {
                        debug!("Connected to {} ({:?})", self.endpoint, ack.code);
                    },
                    Event::Incoming(Packet::PubAck(_)) => return Ok::<(), AlarmSrvError>(()),
                    _ => {},
                }
            }
        })
        .await;

        // best effort; the session is discarded either way
        if client.try_disconnect().is_ok() {
            let _ = tokio::time::timeout(Duration::from_millis(500), eventloop.poll()).await;
        }

        match acked {
            Ok(result) => result,
            Err(_) => Err(AlarmSrvError::timeout(format!(
                "no acknowledgement from {} within {}s",
                self.endpoint,
                self.settings.timeout.as_secs()
            ))),
        }
    }

    fn name(&self) -> &str {
        &self.endpoint
    }
}
