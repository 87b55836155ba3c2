//! AlarmSrv - cold-room alarm service
//!
//! Receives alarm payloads from sensor gateways over TCP, throttles them
//! (per sensor and fleet-wide), and notifies operators via MQTT and SMS.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod expiry;
pub mod listener;
pub mod parser;
pub mod pipeline;
pub mod store;
pub mod types;
pub mod workers;

pub use config::AlarmSrvConfig;
pub use dispatcher::{DispatchOutcome, Dispatcher, MessageBus, SmsGateway};
pub use error::{AlarmSrvError, Result};
pub use expiry::{ExpiryHandle, ExpiryScheduler, ExpiryScope};
pub use listener::AlarmListener;
pub use pipeline::{AlarmPipeline, PipelineOutcome};
pub use store::{Admission, AlarmStore, SuppressReason};
pub use types::{AlarmRecord, SendStatus, SensorGroup};
pub use workers::DispatchWorkers;
