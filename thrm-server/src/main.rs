//! Theremin server (thrm-server) - Main entry point
//!
//! Wires the sensing node, bus listener, state bus, audio output and
//! dashboard API together and runs them until Ctrl+C or SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use thrm_common::bus::{LocalBus, MessageBus};
use thrm_common::config::ThereminConfig;
use thrm_sensor::{SensorNode, SimulatedSensor};
use thrm_server::api::{self, AppContext};
use thrm_server::audio::{callback::run_fault_reporter, AudioOutput, CallbackStats, SynthSource};
use thrm_server::mapping::ParameterMapper;
use thrm_server::sse::SseBroadcaster;
use thrm_server::synth::{AudioParameters, HarmonicProfile, ParameterStore, ToneSynthesizer};
use thrm_server::transport::run_bus_listener;
use thrm_server::StateBus;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for thrm-server
#[derive(Parser, Debug)]
#[command(name = "thrm-server")]
#[command(about = "Electronic theremin: sensing, synthesis and live dashboard")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "THRM_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP port, overrides the configuration file
    #[arg(short, long, env = "THRM_PORT")]
    port: Option<u16>,

    /// Audio output device name
    #[arg(short, long)]
    device: Option<String>,

    /// Run without audio output
    #[arg(long)]
    no_audio: bool,

    /// List audio output devices and exit
    #[arg(long)]
    list_devices: bool,
}

/// Upper bound on how long background tasks get to finish at shutdown
const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let mut config =
        ThereminConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(device) = args.device.clone() {
        config.audio.device = Some(device);
    }
    if args.no_audio {
        config.audio.enabled = false;
    }

    // Initialize tracing
    let level = &config.logging.level;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!(
                "thrm_server={level},thrm_sensor={level},thrm_common={level},tower_http=info"
            )
            .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if args.list_devices {
        let devices = AudioOutput::list_devices().context("Failed to list audio devices")?;
        for name in devices {
            println!("{}", name);
        }
        return Ok(());
    }

    info!("Starting theremin server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Bands: {}-{} cm (buffer {}-{} cm) -> {}-{} Hz",
        config.mapping.min_cm,
        config.mapping.max_cm,
        config.mapping.buffer_min_cm,
        config.mapping.buffer_max_cm,
        config.mapping.min_hz,
        config.mapping.max_hz
    );

    // Signal path
    let profile = Arc::new(
        HarmonicProfile::new(&config.synth.harmonics).context("Invalid harmonic profile")?,
    );
    let mapper = ParameterMapper::new(config.mapping.clone()).context("Invalid distance bands")?;
    let params = Arc::new(ParameterStore::new(AudioParameters {
        frequency_hz: 0.0,
        ..AudioParameters::default()
    }));
    let visualizer = ToneSynthesizer::new(Arc::clone(&profile), config.audio.sample_rate, false)
        .context("Failed to create waveform renderer")?;
    let broadcaster = SseBroadcaster::new(100);
    let state = Arc::new(StateBus::new(
        Arc::clone(&params),
        mapper,
        visualizer,
        config.dashboard.clone(),
        broadcaster,
    ));

    // Bus: subscribe before the sensing node starts publishing
    info!("Message bus: in-process (broker endpoint {})", config.transport.endpoint());
    let bus = LocalBus::new(config.transport.capacity);
    let bus_rx = bus.subscribe();
    let bus: Arc<dyn MessageBus> = Arc::new(bus);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Audio output; failure here leaves sensing and dashboard running
    let stats = Arc::new(CallbackStats::new());
    let mut audio = if config.audio.enabled {
        match start_audio(&config, Arc::clone(&profile), Arc::clone(&params), Arc::clone(&stats)) {
            Ok(output) => Some(output),
            Err(e) => {
                error!("Audio output unavailable, continuing without sound: {:#}", e);
                None
            }
        }
    } else {
        info!("Audio output disabled");
        None
    };
    let audio_device = audio.as_ref().map(|output| output.device_name());

    // Background tasks
    let listener = tokio::spawn(run_bus_listener(
        bus_rx,
        Arc::clone(&state),
        shutdown_rx.clone(),
    ));
    let broadcast = tokio::spawn(Arc::clone(&state).run_broadcast_loop(shutdown_rx.clone()));
    let reporter = tokio::spawn(run_fault_reporter(
        Arc::clone(&stats),
        Duration::from_secs(1),
        shutdown_rx.clone(),
    ));
    let sensor = SimulatedSensor::new(
        config.sensing.pot_max_raw,
        config.sensing.simulated_failure_rate,
    );
    let node = tokio::spawn(
        SensorNode::new(sensor, Arc::clone(&bus), &config.sensing).run(shutdown_rx.clone()),
    );

    // HTTP API
    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid server host {}", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);
    let ctx = AppContext {
        state: Arc::clone(&state),
        stats: Arc::clone(&stats),
        audio_device,
    };
    if let Err(e) = api::run(addr, ctx, shutdown_signal()).await {
        error!("{}", e);
    }

    // Stop producers before the audio device
    info!("Shutting down");
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, node).await {
        Ok(Ok(stats)) => info!(
            "Sensor node stopped: published={} skipped={}",
            stats.published, stats.skipped
        ),
        Ok(Err(e)) => warn!("Sensor node task failed: {}", e),
        Err(_) => warn!("Sensor node did not stop in time"),
    }
    for (name, handle) in [("dashboard broadcast", broadcast), ("fault reporter", reporter)] {
        if tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, handle).await.is_err() {
            warn!("{} task did not stop in time", name);
        }
    }
    if tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, listener).await.is_err() {
        warn!("Bus listener did not stop in time");
    }

    if let Some(output) = audio.as_mut() {
        if let Err(e) = output.stop() {
            warn!("Audio stop: {}", e);
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Open the configured device and start the synthesizer on it
fn start_audio(
    config: &ThereminConfig,
    profile: Arc<HarmonicProfile>,
    params: Arc<ParameterStore>,
    stats: Arc<CallbackStats>,
) -> Result<AudioOutput> {
    let mut output = AudioOutput::open(&config.audio, stats)?;
    let synth = ToneSynthesizer::new(profile, output.sample_rate(), config.synth.phase_continuous)?;
    output.start(SynthSource::new(synth, params))?;
    info!(
        "Audio output running on '{}' ({} Hz, {} frames per block)",
        output.device_name(),
        output.sample_rate(),
        output.block_size()
    );
    Ok(output)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
