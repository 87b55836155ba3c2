//! Alarm notification
//!
//! An admitted alarm goes out on two independent channels: a presence marker
//! published to the message bus under the sensor id, and one SMS per
//! configured recipient. Neither channel's failure affects the other, and
//! one recipient's failure never affects the rest.

pub mod mqtt;
pub mod sms;

use std::sync::Arc;

use async_trait::async_trait;
use errors::ColdwatchErrorTrait;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::types::{AlarmRecord, SendStatus};

pub use mqtt::MqttBus;
pub use sms::HttpSmsGateway;

/// Publish-only message bus
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()>;

    fn name(&self) -> &str;
}

/// Delivers one text message to one recipient
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send(&self, recipient: &str, message: &str) -> Result<()>;

    fn name(&self) -> &str;
}

/// Render the operator-facing alarm text
pub fn format_alarm_message(record: &AlarmRecord) -> String {
    format!(
        "Alarm Alert!\nAlarm Case: {}\nSensor Id: {}\nValue: {}\nTime: {}\n",
        record.alarm_type, record.sensor_id, record.value, record.observed_at
    )
}

/// What one dispatch achieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    pub bus_published: bool,
    pub sms_attempted: usize,
    pub sms_sent: usize,
}

impl DispatchOutcome {
    pub fn send_status(&self) -> SendStatus {
        if self.sms_attempted > 0 && self.sms_sent == self.sms_attempted {
            SendStatus::Sent
        } else if self.sms_sent > 0 {
            SendStatus::PartiallySent
        } else {
            SendStatus::NotSent
        }
    }
}

/// Fan-out to the configured channels
pub struct Dispatcher {
    bus: Option<Arc<dyn MessageBus>>,
    bus_payload: Vec<u8>,
    sms: Option<Arc<dyn SmsGateway>>,
    recipients: Vec<String>,
}

impl Dispatcher {
    /// Dispatcher with both channels disabled
    pub fn new(recipients: Vec<String>) -> Self {
        Self {
            bus: None,
            bus_payload: b"1".to_vec(),
            sms: None,
            recipients,
        }
    }

    pub fn with_bus(mut self, bus: Arc<dyn MessageBus>, payload: impl Into<Vec<u8>>) -> Self {
        self.bus = Some(bus);
        self.bus_payload = payload.into();
        self
    }

    pub fn with_sms(mut self, gateway: Arc<dyn SmsGateway>) -> Self {
        self.sms = Some(gateway);
        self
    }

    pub async fn dispatch(&self, record: &AlarmRecord) -> DispatchOutcome {
        let message = format_alarm_message(record);
        debug!(sensor_id = %record.sensor_id, "Alarm message: {:?}", message);

        let (bus_published, (sms_attempted, sms_sent)) =
            tokio::join!(self.publish_marker(record), self.send_sms(record, &message));

        let outcome = DispatchOutcome {
            bus_published,
            sms_attempted,
            sms_sent,
        };
        info!(
            sensor_id = %record.sensor_id,
            bus_published,
            "SMS alerts: {} of {} sent ({})",
            sms_sent,
            sms_attempted,
            outcome.send_status()
        );
        outcome
    }

    async fn publish_marker(&self, record: &AlarmRecord) -> bool {
        let Some(bus) = &self.bus else {
            debug!("No message bus configured, skipping publish");
            return false;
        };

        match bus.publish(&record.sensor_id, &self.bus_payload).await {
            Ok(()) => {
                debug!(sensor_id = %record.sensor_id, "Published alarm marker to {}", bus.name());
                true
            },
            Err(e) => {
                warn!(
                    sensor_id = %record.sensor_id,
                    code = e.error_code(),
                    transient = e.is_transient(),
                    "Publish to {} failed: {}",
                    bus.name(),
                    e
                );
                false
            },
        }
    }

    /// Returns (attempted, sent)
    async fn send_sms(&self, record: &AlarmRecord, message: &str) -> (usize, usize) {
        let Some(gateway) = &self.sms else {
            debug!("No SMS gateway configured, skipping SMS");
            return (0, 0);
        };
        if self.recipients.is_empty() {
            warn!(sensor_id = %record.sensor_id, "No phone numbers configured for SMS alerts");
            return (0, 0);
        }

        let sends = self.recipients.iter().map(|recipient| async move {
            match gateway.send(recipient, message).await {
                Ok(()) => {
                    debug!("SMS sent to {} via {}", recipient, gateway.name());
                    true
                },
                Err(e) => {
                    warn!(
                        code = e.error_code(),
                        transient = e.is_transient(),
                        "SMS to {} via {} failed: {}",
                        recipient,
                        gateway.name(),
                        e
                    );
                    false
                },
            }
        });

        let results = join_all(sends).await;
        let sent = results.iter().filter(|ok| **ok).count();
        (results.len(), sent)
    }
}
