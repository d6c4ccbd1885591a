// # joyrided - Joyride DNS Daemon
//
// Thin integration layer over joyride-core. Responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing tracing and the runtime
// 3. Wiring the event bus, record store, hosts detector and DNS responder
// 4. Running until SIGTERM/SIGINT, then tearing everything down in order
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// - `JOYRIDE_DNS_BIND_ADDRESS`: Address the DNS socket binds to (default 0.0.0.0)
// - `JOYRIDE_DNS_PORT`: UDP port (default 53)
// - `JOYRIDE_HOSTS_DIRECTORY`: Directory of hosts files (default /app/hosts)
// - `JOYRIDE_HOSTS_POLL_INTERVAL`: Seconds between scans (default 5)
// - `JOYRIDE_HOSTS_PUBLISH_EVENTS`: Publish hosts changes as events (default true)
// - `JOYRIDE_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export JOYRIDE_DNS_PORT=5353
// export JOYRIDE_HOSTS_DIRECTORY=/etc/joyride/hosts.d
// joyrided
// ```

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use joyride_core::events::{FilterCriteria, SystemPayload, types};
use joyride_core::{
    DnsResponder, Event, EventBus, EventPublisher, HostsDetector, JoyrideConfig, RecordStore,
};
use serde_json::{Map, Value};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Source name for events the daemon publishes
const DAEMON_SOURCE: &str = "joyrided";

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoyrideExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<JoyrideExitCode> for ExitCode {
    fn from(code: JoyrideExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon configuration
struct Config {
    joyride: JoyrideConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut joyride = JoyrideConfig::new();

        if let Some(addr) = lookup("JOYRIDE_DNS_BIND_ADDRESS") {
            joyride.dns.bind_address = addr
                .trim()
                .parse()
                .with_context(|| format!("JOYRIDE_DNS_BIND_ADDRESS '{}' is not an IP address", addr))?;
        }
        if let Some(port) = lookup("JOYRIDE_DNS_PORT") {
            joyride.dns.port = port
                .trim()
                .parse()
                .with_context(|| format!("JOYRIDE_DNS_PORT '{}' is not a valid port", port))?;
        }
        if let Some(dir) = lookup("JOYRIDE_HOSTS_DIRECTORY") {
            joyride.hosts.directory = dir.trim().into();
        }
        if let Some(interval) = lookup("JOYRIDE_HOSTS_POLL_INTERVAL") {
            joyride.hosts.poll_interval_secs = interval.trim().parse().with_context(|| {
                format!("JOYRIDE_HOSTS_POLL_INTERVAL '{}' is not a number of seconds", interval)
            })?;
        }
        if let Some(publish) = lookup("JOYRIDE_HOSTS_PUBLISH_EVENTS") {
            joyride.hosts.publish_events = parse_bool(&publish).with_context(|| {
                format!("JOYRIDE_HOSTS_PUBLISH_EVENTS '{}' is not a boolean", publish)
            })?;
        }

        Ok(Self {
            joyride,
            log_level: lookup("JOYRIDE_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.joyride.validate()?;

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "JOYRIDE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    fn tracing_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("expected true or false"),
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return JoyrideExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return JoyrideExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.tracing_level())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return JoyrideExitCode::ConfigError.into();
    }

    info!("Starting joyrided daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return JoyrideExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config.joyride)).into()
}

/// Run the daemon until a shutdown signal arrives
async fn run_daemon(config: JoyrideConfig) -> JoyrideExitCode {
    let bus = Arc::new(EventBus::new());
    if let Err(e) = bus.subscribe(FilterCriteria::new().pattern("*"), |event| {
        debug!(
            event_type = event.event_type(),
            source = event.source(),
            event_id = event.id(),
            "Event"
        );
        Ok(())
    }) {
        error!("Failed to register event logger: {}", e);
        return JoyrideExitCode::ConfigError;
    }

    let store = RecordStore::new();
    let responder = DnsResponder::new(config.dns.clone(), store.clone());
    let publisher: Arc<dyn EventPublisher> = bus.clone();
    let detector = HostsDetector::new(config.hosts.clone(), store).with_publisher(publisher);

    if let Err(e) = responder.start().await {
        error!("Failed to start DNS responder: {}", e);
        bus.shutdown();
        return JoyrideExitCode::ConfigError;
    }
    if let Err(e) = detector.start().await {
        error!("Failed to start hosts detector: {}", e);
        responder.stop().await;
        bus.shutdown();
        return JoyrideExitCode::ConfigError;
    }

    publish_system_event(&bus, types::SYSTEM_STARTED, "start", &config);
    info!(
        dns = %config.dns.listen_addr(),
        hosts = %config.hosts.directory.display(),
        "Joyride DNS is running"
    );

    let exit = match wait_for_shutdown().await {
        Ok(signal) => {
            info!("Received shutdown signal: {}", signal);
            JoyrideExitCode::CleanShutdown
        }
        Err(e) => {
            error!("Shutdown error: {:#}", e);
            JoyrideExitCode::RuntimeError
        }
    };

    publish_system_event(&bus, types::SYSTEM_STOPPED, "stop", &config);
    detector.stop().await;
    responder.stop().await;
    bus.shutdown();

    info!("Shutdown complete");
    exit
}

fn publish_system_event(bus: &EventBus, event_type: &str, operation: &str, config: &JoyrideConfig) {
    let configuration = match serde_json::to_value(config) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    let payload = SystemPayload::new("joyride", operation, "success").with_configuration(configuration);

    match Event::new(event_type, DAEMON_SOURCE, payload) {
        Ok(event) => {
            bus.publish(&event);
        }
        Err(e) => warn!("Failed to build {} event: {}", event_type, e),
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
