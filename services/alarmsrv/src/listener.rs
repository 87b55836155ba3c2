//! TCP ingestion
//!
//! Gateways connect and stream raw alarm payloads. Each `read` is treated as
//! one complete payload; there is no framing and no reply.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{AlarmSrvError, Result};
use crate::pipeline::{AlarmPipeline, PipelineOutcome};

/// Pause after a failed accept (e.g. EMFILE) before trying again
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

pub struct AlarmListener {
    listener: TcpListener,
    chunk_size: usize,
}

impl AlarmListener {
    /// Bind `addr` (`host:port`); failure here is fatal for the service
    pub async fn bind(addr: &str, chunk_size: usize) -> Result<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| AlarmSrvError::config(format!("Invalid listen address {addr}: {e}")))?;

        let socket = if addr.is_ipv6() {
            TcpSocket::new_v6()
        } else {
            TcpSocket::new_v4()
        }
        .map_err(|e| AlarmSrvError::connection(format!("Failed to create socket: {e}")))?;
        socket
            .set_reuseaddr(true)
            .map_err(|e| AlarmSrvError::connection(format!("Failed to set SO_REUSEADDR: {e}")))?;
        socket
            .bind(addr)
            .map_err(|e| AlarmSrvError::connection(format!("Failed to bind to {addr}: {e}")))?;
        let listener = socket
            .listen(1024)
            .map_err(|e| AlarmSrvError::connection(format!("Failed to listen on {addr}: {e}")))?;

        Ok(Self {
            listener,
            chunk_size: chunk_size.max(1),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept until `shutdown` fires; one task per connection
    pub async fn run(self, pipeline: Arc<AlarmPipeline>, shutdown: CancellationToken) {
        if let Ok(addr) = self.listener.local_addr() {
            info!("Listening for gateway connections on {}", addr);
        }

        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    info!("Accepted gateway connection from {}", peer);
                    tokio::spawn(handle_connection(
                        stream,
                        peer,
                        pipeline.clone(),
                        self.chunk_size,
                        shutdown.clone(),
                    ));
                },
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    if !accept_backoff(&shutdown).await {
                        break;
                    }
                },
            }
        }

        info!("Alarm listener stopped");
    }
}

/// Returns false if shutdown fired while waiting
async fn accept_backoff(shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => true,
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    pipeline: Arc<AlarmPipeline>,
    chunk_size: usize,
    shutdown: CancellationToken,
) {
    let mut buffer = vec![0u8; chunk_size];

    loop {
        let read = tokio::select! {
            _ = shutdown.cancelled() => break,
            read = stream.read(&mut buffer) => read,
        };

        match read {
            Ok(0) => {
                info!("Gateway {} disconnected", peer);
                break;
            },
            Ok(n) => {
                debug!("Received {} bytes from {}", n, peer);
                match pipeline.handle_chunk(&buffer[..n]) {
                    PipelineOutcome::ParseFailed(e) => {
                        debug!("Payload from {} rejected: {}", peer, e);
                    },
                    outcome => debug!("Payload from {} handled: {:?}", peer, outcome),
                }
            },
            Err(e) => {
                error!("Error reading from gateway {}: {}", peer, e);
                break;
            },
        }
    }
}
