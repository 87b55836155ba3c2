//! Deferred removal of alarm records
//!
//! A single task owns a `DelayQueue` keyed by sensor id. Callers talk to it
//! through an unbounded channel, so scheduling never blocks or awaits.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::time::delay_queue::{DelayQueue, Key};
use tracing::{debug, info};

use crate::config::AlarmSrvConfig;
use crate::error::{AlarmSrvError, Result};
use crate::store::AlarmStore;
use crate::types::SensorGroup;

/// Which admitted sensors get a removal timer
#[derive(Debug, Clone, Default)]
pub struct ExpiryScope {
    cold_room: HashSet<String>,
    normal_room: HashSet<String>,
    expire_ungrouped: bool,
}

impl ExpiryScope {
    pub fn new(
        cold_room: impl IntoIterator<Item = String>,
        normal_room: impl IntoIterator<Item = String>,
        expire_ungrouped: bool,
    ) -> Self {
        Self {
            cold_room: cold_room.into_iter().collect(),
            normal_room: normal_room.into_iter().collect(),
            expire_ungrouped,
        }
    }

    pub fn from_config(config: &AlarmSrvConfig) -> Self {
        Self::new(
            config.cold_room_sensors.iter().cloned(),
            config.normal_room_sensors.iter().cloned(),
            config.expire_ungrouped_sensors,
        )
    }

    pub fn group_of(&self, sensor_id: &str) -> SensorGroup {
        if self.cold_room.contains(sensor_id) {
            SensorGroup::ColdRoom
        } else if self.normal_room.contains(sensor_id) {
            SensorGroup::NormalRoom
        } else {
            SensorGroup::Ungrouped
        }
    }

    pub fn covers(&self, sensor_id: &str) -> bool {
        match self.group_of(sensor_id) {
            SensorGroup::ColdRoom | SensorGroup::NormalRoom => true,
            SensorGroup::Ungrouped => self.expire_ungrouped,
        }
    }
}

#[derive(Debug)]
enum ExpiryCommand {
    Schedule(String),
    Cancel(String),
}

/// Sending side of the expiry task
#[derive(Debug, Clone)]
pub struct ExpiryHandle {
    tx: mpsc::UnboundedSender<ExpiryCommand>,
}

impl ExpiryHandle {
    /// Drop `sensor_id` after the grace period, replacing any pending timer
    pub fn schedule(&self, sensor_id: &str) -> Result<()> {
        self.send(ExpiryCommand::Schedule(sensor_id.to_string()))
    }

    /// Forget a pending timer; the record stays in the store
    pub fn cancel(&self, sensor_id: &str) -> Result<()> {
        self.send(ExpiryCommand::Cancel(sensor_id.to_string()))
    }

    fn send(&self, command: ExpiryCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| AlarmSrvError::internal("expiry scheduler stopped"))
    }
}

pub struct ExpiryScheduler;

impl ExpiryScheduler {
    /// Start the expiry task
    ///
    /// The task stops when `shutdown` fires or every handle has been dropped;
    /// pending timers are discarded either way.
    pub fn spawn(
        store: Arc<AlarmStore>,
        grace: Duration,
        shutdown: CancellationToken,
    ) -> (ExpiryHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(store, grace, rx, shutdown));
        (ExpiryHandle { tx }, task)
    }
}

async fn run(
    store: Arc<AlarmStore>,
    grace: Duration,
    mut commands: mpsc::UnboundedReceiver<ExpiryCommand>,
    shutdown: CancellationToken,
) {
    let mut queue: DelayQueue<String> = DelayQueue::new();
    let mut pending: HashMap<String, Key> = HashMap::new();

    debug!("Expiry scheduler started (grace {}s)", grace.as_secs());

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,

            command = commands.recv() => match command {
                Some(ExpiryCommand::Schedule(sensor_id)) => {
                    if let Some(key) = pending.get(&sensor_id) {
                        queue.reset(key, grace);
                    } else {
                        let key = queue.insert(sensor_id.clone(), grace);
                        pending.insert(sensor_id, key);
                    }
                },
                Some(ExpiryCommand::Cancel(sensor_id)) => {
                    if let Some(key) = pending.remove(&sensor_id) {
                        queue.remove(&key);
                        debug!(sensor_id, "Expiry cancelled");
                    }
                },
                None => break,
            },

            Some(expired) = queue.next(), if !queue.is_empty() => {
                let sensor_id = expired.into_inner();
                pending.remove(&sensor_id);
                if store.drop_alarm(&sensor_id) {
                    info!(sensor_id, "Alarm expired, sensor may alarm again");
                }
            },
        }
    }

    debug!(
        "Expiry scheduler stopped with {} pending timer(s)",
        pending.len()
    );
}
