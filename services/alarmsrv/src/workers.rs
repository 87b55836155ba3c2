//! Dispatch worker pool

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;
use crate::store::AlarmStore;
use crate::types::AlarmRecord;

/// Workers sharing one receiver of the dispatch queue
pub struct DispatchWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl DispatchWorkers {
    /// Spawn `count` workers (at least one)
    pub fn spawn(
        count: usize,
        dispatcher: Arc<Dispatcher>,
        store: Arc<AlarmStore>,
        rx: mpsc::Receiver<AlarmRecord>,
        shutdown: CancellationToken,
    ) -> Self {
        let rx = Arc::new(Mutex::new(rx));
        let handles = (0..count.max(1))
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    dispatcher.clone(),
                    store.clone(),
                    rx.clone(),
                    shutdown.clone(),
                ))
            })
            .collect();
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to finish its current dispatch and exit
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!("Dispatch worker panicked: {}", e);
            }
        }
    }
}

async fn worker_loop(
    id: usize,
    dispatcher: Arc<Dispatcher>,
    store: Arc<AlarmStore>,
    rx: Arc<Mutex<mpsc::Receiver<AlarmRecord>>>,
    shutdown: CancellationToken,
) {
    debug!("Dispatch worker {} started", id);

    loop {
        let next = {
            let mut rx = rx.lock().await;
            tokio::select! {
                _ = shutdown.cancelled() => None,
                record = rx.recv() => record,
            }
        };
        let Some(record) = next else { break };

        let outcome = dispatcher.dispatch(&record).await;
        let status = outcome.send_status();
        if store.set_send_status(&record.sensor_id, status) {
            debug!(sensor_id = %record.sensor_id, "Send status: {}", status);
        } else {
            info!(sensor_id = %record.sensor_id, "Alarm expired before dispatch finished");
        }
    }

    debug!("Dispatch worker {} stopped", id);
}
