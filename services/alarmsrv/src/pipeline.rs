//! Per-chunk alarm handling: parse, admit, schedule expiry, queue dispatch
//!
//! Runs synchronously on the connection task and never awaits network I/O;
//! notification happens on the dispatch workers.

use std::sync::Arc;

use errors::ColdwatchErrorTrait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use crate::error::AlarmSrvError;
use crate::expiry::{ExpiryHandle, ExpiryScope};
use crate::parser::{self, ParseError};
use crate::store::{Admission, AlarmStore, SuppressReason};
use crate::types::AlarmRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    ParseFailed(ParseError),
    Suppressed(SuppressReason),
    /// Admitted and handed to the dispatch workers
    Dispatched(String),
    /// Admitted, but the notification was dropped
    QueueFull(String),
    /// Admitted while the workers were already gone
    QueueClosed(String),
}

pub struct AlarmPipeline {
    store: Arc<AlarmStore>,
    expiry: ExpiryHandle,
    scope: ExpiryScope,
    dispatch_tx: mpsc::Sender<AlarmRecord>,
}

impl AlarmPipeline {
    pub fn new(
        store: Arc<AlarmStore>,
        expiry: ExpiryHandle,
        scope: ExpiryScope,
        dispatch_tx: mpsc::Sender<AlarmRecord>,
    ) -> Self {
        Self {
            store,
            expiry,
            scope,
            dispatch_tx,
        }
    }

    pub fn handle_chunk(&self, chunk: &[u8]) -> PipelineOutcome {
        let record = match parser::parse(chunk) {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    code = AlarmSrvError::from(e.clone()).error_code(),
                    "Failed to parse alarm payload: {}",
                    e
                );
                debug!("Problematic input: {:?}", String::from_utf8_lossy(chunk));
                return PipelineOutcome::ParseFailed(e);
            },
        };

        info!(
            alarm_type = %record.alarm_type,
            sensor_id = %record.sensor_id,
            gateway_id = %record.gateway_id,
            value = %record.value,
            time = %record.observed_at,
            "Parsed alarm"
        );

        let record = match self.store.admit(record) {
            Admission::Admitted(record) => record,
            Admission::Suppressed(reason) => {
                info!("Alarm suppressed: {}", reason);
                return PipelineOutcome::Suppressed(reason);
            },
        };

        let sensor_id = record.sensor_id.clone();
        if self.scope.covers(&sensor_id) {
            debug!(
                sensor_id,
                group = %self.scope.group_of(&sensor_id),
                "Scheduling alarm expiry"
            );
            if let Err(e) = self.expiry.schedule(&sensor_id) {
                error!(sensor_id, "Could not schedule expiry: {}", e);
            }
        } else {
            debug!(sensor_id, "Sensor outside expiry scope, alarm stays active");
        }

        match self.dispatch_tx.try_send(record) {
            Ok(()) => PipelineOutcome::Dispatched(sensor_id),
            Err(TrySendError::Full(_)) => {
                warn!(sensor_id, "Dispatch queue full, notification dropped");
                PipelineOutcome::QueueFull(sensor_id)
            },
            Err(TrySendError::Closed(_)) => {
                error!(sensor_id, "Dispatch queue closed, notification dropped");
                PipelineOutcome::QueueClosed(sensor_id)
            },
        }
    }
}
