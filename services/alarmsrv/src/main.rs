//! Alarm Service (AlarmSrv)
//!
//! Cold-room alarm ingestion: TCP listener → parser → store → MQTT / SMS.

use std::sync::Arc;

use alarmsrv::config::{AlarmSrvConfig, DEFAULT_CONFIG_PATH};
use alarmsrv::dispatcher::{Dispatcher, HttpSmsGateway, MqttBus};
use alarmsrv::{
    AlarmListener, AlarmPipeline, AlarmStore, DispatchWorkers, ExpiryScheduler, ExpiryScope,
};
use clap::Parser;
use common::bootstrap_args::ServiceArgs;
use common::service_bootstrap::{self, ServiceInfo};
use common::shutdown::wait_for_shutdown;
use errors::{startup_error, ColdwatchResult};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Workers get this long to finish in-flight notifications on shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Parser, Debug)]
#[command(name = "alarmsrv")]
#[command(about = "ColdWatch alarm service")]
#[command(version)]
struct Args {
    /// Configuration file (JSON, YAML or TOML)
    #[arg(short, long, env = "ALARMSRV_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Listen address override, e.g. 0.0.0.0:5060
    #[arg(short, long)]
    bind_address: Option<String>,

    /// Disable colored console output
    #[arg(long)]
    no_color: bool,

    /// Check the configuration and exit
    #[arg(long)]
    validate: bool,
}

impl From<Args> for ServiceArgs {
    fn from(args: Args) -> Self {
        ServiceArgs {
            log_level: args.log_level,
            bind_address: args.bind_address,
            no_color: args.no_color,
            validate: args.validate,
            config_path: args.config,
        }
    }
}

#[tokio::main]
async fn main() -> ColdwatchResult<()> {
    service_bootstrap::load_development_env();
    let args: ServiceArgs = Args::parse().into();

    let service = ServiceInfo::new(
        "alarmsrv",
        "Cold-room alarm ingestion and notification",
        5060,
    );

    // Loaded before logging so the log directory can come from the file
    let config_path = args.get_config_path(DEFAULT_CONFIG_PATH);
    let loaded = AlarmSrvConfig::load(&config_path);
    let log_dir = loaded.as_ref().ok().and_then(|c| c.log_dir.clone());

    service_bootstrap::init_logging(&service, &args, log_dir.as_deref())?;
    service_bootstrap::print_startup_banner(&service);

    let config = match loaded {
        Ok(config) => {
            info!("Configuration loaded from {}", config_path);
            config
        },
        Err(e) => {
            error!(
                "Failed to load configuration from {}: {}. Falling back to defaults",
                config_path, e
            );
            AlarmSrvConfig::default()
        },
    };

    let warnings = config.validate();
    for warning in &warnings {
        warn!("Config: {}", warning);
    }
    if args.validate {
        info!(
            "Configuration check finished with {} warning(s)",
            warnings.len()
        );
        return Ok(());
    }

    let listen_address = args
        .bind_address
        .clone()
        .unwrap_or_else(|| config.listen_address());

    let shutdown = CancellationToken::new();
    let store = Arc::new(AlarmStore::new(config.cooldown()));
    info!(
        "Global cooldown {}s, expiry grace {}s, expire ungrouped sensors: {}",
        config.cooldown().as_secs(),
        config.expiry_grace_secs,
        config.expire_ungrouped_sensors
    );

    let (expiry, expiry_task) =
        ExpiryScheduler::spawn(store.clone(), config.expiry_grace(), shutdown.clone());

    let dispatcher = Arc::new(build_dispatcher(&config));
    let (dispatch_tx, dispatch_rx) = mpsc::channel(config.dispatch_queue_capacity.max(1));
    let workers = DispatchWorkers::spawn(
        config.dispatch_workers,
        dispatcher,
        store.clone(),
        dispatch_rx,
        shutdown.clone(),
    );
    info!("Started {} dispatch worker(s)", workers.len());

    let pipeline = Arc::new(AlarmPipeline::new(
        store.clone(),
        expiry,
        ExpiryScope::from_config(&config),
        dispatch_tx,
    ));

    let listener = AlarmListener::bind(&listen_address, config.read_chunk_size)
        .await
        .map_err(|e| {
            error!("Cannot listen on {}: {}", listen_address, e);
            startup_error!("bind {}: {}", listen_address, e)
        })?;
    let listener_task = tokio::spawn(listener.run(pipeline, shutdown.clone()));

    info!("AlarmSrv started");
    let signal = wait_for_shutdown().await;
    info!("Shutdown signal received: {}", signal);

    shutdown.cancel();
    if let Err(e) = listener_task.await {
        warn!("Listener task ended abnormally: {}", e);
    }
    if timeout(DRAIN_TIMEOUT, workers.join()).await.is_err() {
        warn!("Dispatch workers did not stop within {}s", DRAIN_TIMEOUT.as_secs());
    }
    if let Err(e) = expiry_task.await {
        warn!("Expiry task ended abnormally: {}", e);
    }

    info!(
        "AlarmSrv stopped with {} active alarm(s)",
        store.len()
    );
    Ok(())
}

/// Channels that fail to configure are disabled, never fatal
fn build_dispatcher(config: &AlarmSrvConfig) -> Dispatcher {
    let mut dispatcher = Dispatcher::new(config.phone_numbers.clone());

    match config.mqtt_settings() {
        Ok(Some(settings)) => {
            info!("MQTT broker: {}:{}", settings.host, settings.port);
            let payload = settings.payload.clone().into_bytes();
            dispatcher = dispatcher.with_bus(Arc::new(MqttBus::new(settings)), payload);
        },
        Ok(None) => info!("No MQTT broker configured, bus publishing disabled"),
        Err(e) => error!("MQTT disabled: {}", e),
    }

    match config.sms_settings() {
        Some(settings) => match HttpSmsGateway::new(settings) {
            Ok(gateway) => {
                info!(
                    "SMS gateway ready, {} recipient(s)",
                    config.phone_numbers.len()
                );
                dispatcher = dispatcher.with_sms(Arc::new(gateway));
            },
            Err(e) => error!("SMS disabled: {}", e),
        },
        None => info!("No SMS gateway configured, SMS disabled"),
    }

    dispatcher
}
