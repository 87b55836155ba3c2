//! Alarm domain types

use serde::{Deserialize, Serialize};

/// Outcome of the SMS fan-out for one alarm, informational only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    #[default]
    NotSent,
    Sent,
    PartiallySent,
}

impl std::fmt::Display for SendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSent => write!(f, "Not Sent"),
            Self::Sent => write!(f, "Sent"),
            Self::PartiallySent => write!(f, "Partially Sent"),
        }
    }
}

/// One sensor alarm as decoded from the wire
///
/// All fields except `send_status` are kept exactly as the firmware sent them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmRecord {
    pub alarm_type: String,
    pub sensor_id: String,
    pub gateway_id: String,
    pub value: String,
    pub observed_at: String,
    #[serde(default)]
    pub send_status: SendStatus,
}

impl AlarmRecord {
    pub fn new(
        alarm_type: impl Into<String>,
        sensor_id: impl Into<String>,
        gateway_id: impl Into<String>,
        value: impl Into<String>,
        observed_at: impl Into<String>,
    ) -> Self {
        Self {
            alarm_type: alarm_type.into(),
            sensor_id: sensor_id.into(),
            gateway_id: gateway_id.into(),
            value: value.into(),
            observed_at: observed_at.into(),
            send_status: SendStatus::NotSent,
        }
    }
}

/// Which configured group a sensor belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorGroup {
    ColdRoom,
    NormalRoom,
    Ungrouped,
}

impl std::fmt::Display for SensorGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ColdRoom => write!(f, "cold-room"),
            Self::NormalRoom => write!(f, "normal-room"),
            Self::Ungrouped => write!(f, "ungrouped"),
        }
    }
}
