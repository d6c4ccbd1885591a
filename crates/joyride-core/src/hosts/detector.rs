// # Hosts Change Detector
//
// Polls a directory of hosts files and keeps the record store in sync.
//
// ## Tick
//
// 1. Re-read every visible file into a fresh snapshot
// 2. Diff against the previous snapshot (adds, then removes)
// 3. Apply each delta to the record store
// 4. Notify the optional callback and publisher
//
// The first tick runs inside `start()` against an empty snapshot, so every
// record already on disk is reported as an add before `start()` returns.
// This holds on every start, including a restart after `stop()`.
//
// ## Failure Behavior
//
// - Missing directory: no work, no deltas, previous snapshot kept. Logged
//   once until the directory reappears.
// - Unreadable file or malformed line: logged and skipped.
// - Failure to list the directory: logged, the loop keeps ticking.
//
// Ticks never overlap: the snapshot lock is held for the whole tick.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::parser::{DeltaAction, HostDelta, HostsSnapshot, diff, load_directory};
use crate::config::HostsConfig;
use crate::error::Result;
use crate::events::{DnsPayload, Event, FilePayload, FileRecord, types};
use crate::server::ServiceState;
use crate::server::lifecycle::ServiceLifecycle;
use crate::store::RecordStore;
use crate::traits::EventPublisher;

/// Source name carried by events the detector publishes
pub const DETECTOR_SOURCE: &str = "hosts_detector";

/// Per-delta callback: `(action, hostname, address)`, address `""` on removal
pub type DeltaCallback = Arc<dyn Fn(DeltaAction, &str, &str) + Send + Sync>;

/// Polling hosts directory detector
pub struct HostsDetector {
    poller: Poller,
    lifecycle: ServiceLifecycle,
}

impl HostsDetector {
    /// Create a detector feeding `store`
    pub fn new(config: HostsConfig, store: RecordStore) -> Self {
        Self {
            poller: Poller {
                config: Arc::new(config),
                store,
                callback: None,
                publisher: None,
                snapshot: Arc::new(Mutex::new(HostsSnapshot::new())),
                directory_missing: Arc::new(AtomicBool::new(false)),
            },
            lifecycle: ServiceLifecycle::new("hosts_detector"),
        }
    }

    /// Invoke `callback` once per applied delta
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(DeltaAction, &str, &str) + Send + Sync + 'static,
    {
        self.poller.callback = Some(Arc::new(callback));
        self
    }

    /// Publish `dns.record.*` and `file.hosts.changed` events
    ///
    /// Ignored when the configuration disables event publishing.
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        if self.poller.config.publish_events {
            self.poller.publisher = Some(publisher);
        }
        self
    }

    /// Watched directory
    pub fn directory(&self) -> &Path {
        &self.poller.config.directory
    }

    pub fn state(&self) -> ServiceState {
        self.lifecycle.state()
    }

    /// Copy of the last applied snapshot
    pub async fn current_records(&self) -> HostsSnapshot {
        self.poller.snapshot.lock().await.clone()
    }

    /// Run one tick now and return the deltas it applied
    pub async fn poll_once(&self) -> Result<Vec<HostDelta>> {
        self.poller.poll_once().await
    }

    /// Run the initial tick and spawn the poll loop
    ///
    /// An invalid configuration is rejected before anything runs. Calling
    /// `start` on a running detector logs a warning and does nothing.
    pub async fn start(&self) -> Result<()> {
        self.poller.config.validate()?;

        let poller = self.poller.clone();
        self.lifecycle
            .start(|shutdown_rx| async move {
                info!(
                    directory = %poller.config.directory.display(),
                    interval = ?poller.config.poll_interval(),
                    "Starting hosts detector"
                );
                poller.reset().await;
                if let Err(e) = poller.poll_once().await {
                    warn!(error = %e, "Initial hosts scan failed");
                }
                Ok(tokio::spawn(poller.run(shutdown_rx)))
            })
            .await?;
        Ok(())
    }

    /// Stop the poll loop and wait for it to exit (idempotent)
    pub async fn stop(&self) {
        if self.lifecycle.stop().await {
            info!("Hosts detector stopped");
        }
    }
}

#[derive(Clone)]
struct Poller {
    config: Arc<HostsConfig>,
    store: RecordStore,
    callback: Option<DeltaCallback>,
    publisher: Option<Arc<dyn EventPublisher>>,
    snapshot: Arc<Mutex<HostsSnapshot>>,
    directory_missing: Arc<AtomicBool>,
}

impl Poller {
    async fn run(self, mut shutdown_rx: oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The immediate first tick was already handled by start()
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    debug!("Hosts detector received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        error!(
                            directory = %self.config.directory.display(),
                            error = %e,
                            "Hosts scan failed"
                        );
                    }
                }
            }
        }
    }

    /// Forget the previous snapshot so the next tick reports every record
    async fn reset(&self) {
        self.snapshot.lock().await.clear();
        self.directory_missing.store(false, Ordering::Relaxed);
    }

    async fn poll_once(&self) -> Result<Vec<HostDelta>> {
        let mut snapshot = self.snapshot.lock().await;
        let directory = &self.config.directory;

        let present = matches!(tokio::fs::metadata(directory).await, Ok(meta) if meta.is_dir());
        if !present {
            if !self.directory_missing.swap(true, Ordering::Relaxed) {
                warn!(
                    directory = %directory.display(),
                    "Hosts directory does not exist, waiting for it to appear"
                );
            }
            return Ok(Vec::new());
        }
        if self.directory_missing.swap(false, Ordering::Relaxed) {
            info!(directory = %directory.display(), "Hosts directory is available");
        }

        let fresh = load_directory(directory).await?;
        let deltas = diff(&snapshot, &fresh);
        if deltas.is_empty() {
            debug!(records = fresh.len(), "No hosts changes");
            return Ok(deltas);
        }

        self.apply(&deltas);
        *snapshot = fresh;
        info!(
            changes = deltas.len(),
            records = snapshot.len(),
            "Hosts changes applied"
        );
        Ok(deltas)
    }

    fn apply(&self, deltas: &[HostDelta]) {
        for delta in deltas {
            let address = match delta {
                HostDelta::Add { hostname, address } => {
                    self.store.set(hostname, *address);
                    debug!(hostname = %hostname, address = %address, "Added DNS record");
                    address.to_string()
                }
                HostDelta::Remove { hostname } => {
                    self.store.remove(hostname);
                    debug!(hostname = %hostname, "Removed DNS record");
                    String::new()
                }
            };

            if let Some(callback) = &self.callback {
                callback(delta.action(), delta.hostname(), &address);
            }
            self.publish_record(delta, &address);
        }
        self.publish_file_change(deltas);
    }

    fn publish_record(&self, delta: &HostDelta, address: &str) {
        let Some(publisher) = &self.publisher else {
            return;
        };

        let (event_type, value) = match delta.action() {
            DeltaAction::Add => (types::DNS_RECORD_ADDED, Some(address.to_string())),
            DeltaAction::Remove => (types::DNS_RECORD_REMOVED, None),
        };
        match Event::new(event_type, DETECTOR_SOURCE, DnsPayload::a_record(delta.hostname(), value))
        {
            Ok(event) => {
                publisher.publish(&event);
            }
            Err(e) => warn!(hostname = delta.hostname(), error = %e, "Failed to build DNS event"),
        }
    }

    fn publish_file_change(&self, deltas: &[HostDelta]) {
        let Some(publisher) = &self.publisher else {
            return;
        };

        let records = deltas
            .iter()
            .map(|delta| FileRecord {
                hostname: delta.hostname().to_string(),
                address: delta.address().map(|a| a.to_string()).unwrap_or_default(),
                action: Some(delta.action().to_string()),
            })
            .collect();
        let payload = FilePayload::new(self.config.directory.display().to_string(), "modified")
            .with_records(records);

        match Event::new(types::FILE_HOSTS_CHANGED, DETECTOR_SOURCE, payload) {
            Ok(event) => {
                publisher.publish(&event);
            }
            Err(e) => warn!(error = %e, "Failed to build hosts change event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn detector(dir: &Path) -> HostsDetector {
        HostsDetector::new(HostsConfig::new(dir), RecordStore::new())
    }

    #[tokio::test]
    async fn test_first_poll_adds_everything() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hosts"), "10.0.0.1 a.local b.local\n").unwrap();

        let detector = detector(dir.path());
        let deltas = detector.poll_once().await.unwrap();

        assert_eq!(deltas.len(), 2);
        assert!(deltas.iter().all(|d| d.action() == DeltaAction::Add));
        assert_eq!(detector.current_records().await.len(), 2);
    }

    #[tokio::test]
    async fn test_unchanged_directory_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hosts"), "10.0.0.1 a.local\n").unwrap();

        let detector = detector(dir.path());
        detector.poll_once().await.unwrap();
        assert!(detector.poll_once().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_callback_receives_empty_address_on_removal() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hosts");
        std::fs::write(&file, "10.0.0.1 a.local\n").unwrap();

        let calls = Arc::new(StdMutex::new(Vec::new()));
        let recorded = calls.clone();
        let detector = detector(dir.path()).with_callback(move |action, host, addr| {
            recorded
                .lock()
                .unwrap()
                .push((action.as_str().to_string(), host.to_string(), addr.to_string()));
        });

        detector.poll_once().await.unwrap();
        std::fs::write(&file, "").unwrap();
        detector.poll_once().await.unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                ("add".to_string(), "a.local".to_string(), "10.0.0.1".to_string()),
                ("remove".to_string(), "a.local".to_string(), String::new()),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_directory_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let detector = detector(&dir.path().join("not-yet"));

        assert!(detector.poll_once().await.unwrap().is_empty());
        assert!(detector.poll_once().await.unwrap().is_empty());
        assert!(detector.current_records().await.is_empty());
    }

    #[tokio::test]
    async fn test_zero_interval_is_rejected_on_start() {
        let dir = tempfile::tempdir().unwrap();
        let config = HostsConfig::new(dir.path()).with_poll_interval_secs(0);
        let detector = HostsDetector::new(config, RecordStore::new());

        let err = detector.start().await.unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
        assert_eq!(detector.state(), ServiceState::Stopped);
    }

    #[tokio::test]
    async fn test_oversized_interval_is_rejected_on_start() {
        let dir = tempfile::tempdir().unwrap();
        let config = HostsConfig::new(dir.path()).with_poll_interval_secs(u64::MAX);
        let detector = HostsDetector::new(config, RecordStore::new());

        assert!(detector.start().await.is_err());
        assert_eq!(detector.state(), ServiceState::Stopped);
        detector.stop().await;
    }

    #[tokio::test]
    async fn test_restart_reports_every_record_again() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hosts"), "10.0.0.1 a.local\n").unwrap();

        let adds = Arc::new(StdMutex::new(0usize));
        let counter = adds.clone();
        let detector = detector(dir.path()).with_callback(move |action, _, _| {
            if action == DeltaAction::Add {
                *counter.lock().unwrap() += 1;
            }
        });

        detector.start().await.unwrap();
        detector.stop().await;
        assert_eq!(*adds.lock().unwrap(), 1);

        detector.start().await.unwrap();
        detector.stop().await;
        assert_eq!(*adds.lock().unwrap(), 2);
        assert_eq!(detector.current_records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_vanished_directory_keeps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let hosts_dir = dir.path().join("hosts.d");
        std::fs::create_dir(&hosts_dir).unwrap();
        std::fs::write(hosts_dir.join("hosts"), "10.0.0.1 a.local\n").unwrap();

        let store = RecordStore::new();
        let detector = HostsDetector::new(HostsConfig::new(&hosts_dir), store.clone());
        detector.poll_once().await.unwrap();

        std::fs::remove_dir_all(&hosts_dir).unwrap();
        assert!(detector.poll_once().await.unwrap().is_empty());
        assert_eq!(store.get("a.local"), Some("10.0.0.1".parse().unwrap()));
    }
}
