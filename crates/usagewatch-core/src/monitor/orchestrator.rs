use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::alerts::{alert_text, AlertNotifier, ThresholdAlerts};
use crate::error::CycleError;
use crate::sink::UsageSink;
use crate::source::PageSource;
use crate::state::{StatusSnapshot, StatusStore};
use crate::usage::{extract_usage, UsageRecord};

/// Default time allowed for the page to load
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs extraction cycles and owns the status slot.
///
/// A cycle loads the page text, extracts a record, stores it, notifies
/// subscribers and finally publishes it to the sinks. At most one cycle is
/// in flight at any time.
pub struct Orchestrator<S> {
    source: S,
    sinks: Vec<Arc<dyn UsageSink>>,
    store: StatusStore,
    updates: watch::Sender<StatusSnapshot>,
    in_flight: tokio::sync::Mutex<()>,
    load_timeout: Duration,
    alerts: Mutex<Option<ThresholdAlerts>>,
    notifier: Option<AlertNotifier>,
}

impl<S: PageSource> Orchestrator<S> {
    /// Create an orchestrator reading from `source` and writing to `store`
    pub fn new(source: S, store: StatusStore) -> Self {
        let (updates, _) = watch::channel(store.snapshot());
        Self {
            source,
            sinks: Vec::new(),
            store,
            updates,
            in_flight: tokio::sync::Mutex::new(()),
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            alerts: Mutex::new(None),
            notifier: None,
        }
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Add a downstream sink
    pub fn with_sink(mut self, sink: impl UsageSink + 'static) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Enable threshold alerts, optionally running `notifier` for each
    pub fn with_alerts(mut self, alerts: ThresholdAlerts, notifier: Option<AlertNotifier>) -> Self {
        self.alerts = Mutex::new(Some(alerts));
        self.notifier = notifier;
        self
    }

    /// Receive a snapshot after every completed cycle
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.updates.subscribe()
    }

    /// Current status
    pub fn snapshot(&self) -> StatusSnapshot {
        self.store.snapshot()
    }

    /// Run one extraction cycle.
    ///
    /// Returns [`CycleError::Busy`] without touching the status if another
    /// cycle is running. Every other failure is recorded as the cycle status
    /// before being returned.
    pub async fn run_cycle(&self) -> Result<UsageRecord, CycleError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("Extraction already in flight, ignoring trigger");
            return Err(CycleError::Busy);
        };

        match self.extract().await {
            Ok(record) => {
                self.commit(&record).await;
                Ok(record)
            }
            Err(e) => {
                warn!("Extraction cycle failed: {}", e);
                let snapshot = self.store.record_failure(e.to_string());
                self.updates.send_replace(snapshot);
                Err(e)
            }
        }
    }

    async fn extract(&self) -> Result<UsageRecord, CycleError> {
        let text = tokio::time::timeout(self.load_timeout, self.source.fetch_text())
            .await
            .map_err(|_| CycleError::Timeout(self.load_timeout))??;
        debug!("Page text loaded ({} bytes)", text.len());
        Ok(extract_usage(&text)?)
    }

    /// Store, notify, then publish. Sink failures do not undo the update.
    async fn commit(&self, record: &UsageRecord) {
        let snapshot = self.store.record_success(record.clone());
        info!(
            "Usage updated: session {}%, weekly {}%",
            record.session, record.weekly
        );
        self.updates.send_replace(snapshot);

        // Sinks do blocking I/O, keep it off the scheduler task
        for sink in &self.sinks {
            let name = sink.name().to_string();
            let sink = Arc::clone(sink);
            let owned = record.clone();
            match tokio::task::spawn_blocking(move || sink.publish(&owned)).await {
                Ok(Ok(())) => debug!("Published to sink {}", name),
                Ok(Err(e)) => warn!("Sink {} failed: {}", name, e),
                Err(e) => warn!("Sink {} task failed: {}", name, e),
            }
        }

        let crossed = match self.alerts.lock().as_mut() {
            Some(alerts) => alerts.check(record.session),
            None => return,
        };
        for threshold in crossed {
            let (title, message) = alert_text(threshold, record.session);
            warn!("{}: {}", title, message);
            if let Some(ref notifier) = self.notifier {
                notifier.notify(&title, &message);
            }
        }
    }
}

impl<S: PageSource + 'static> Orchestrator<S> {
    /// Run cycles in a background task: once immediately, then every
    /// `interval`, plus whenever [`MonitorHandle::scrape_now`] is called.
    ///
    /// Dropping the returned handle stops the loop after the current cycle.
    pub fn spawn(self, interval: Duration) -> MonitorHandle {
        let updates = self.subscribe();
        let store = self.store.clone();
        let orchestrator = Arc::new(self);
        // Capacity 1: extra manual triggers coalesce into the pending one
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_loop(orchestrator, interval, trigger_rx, shutdown_rx));

        MonitorHandle {
            trigger: trigger_tx,
            shutdown: shutdown_tx,
            updates,
            store,
            task,
        }
    }
}

async fn run_loop<S: PageSource>(
    orchestrator: Arc<Orchestrator<S>>,
    interval: Duration,
    mut trigger_rx: mpsc::Receiver<()>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Scheduler started (interval {}s)", interval.as_secs());

    loop {
        tokio::select! {
            _ = ticker.tick() => debug!("Scheduled extraction"),
            Some(()) = trigger_rx.recv() => info!("Manual extraction requested"),
            _ = shutdown_rx.changed() => break,
        }

        // Failures are already recorded in the status slot
        let _ = orchestrator.run_cycle().await;
    }

    info!("Scheduler stopped");
}

/// Control handle for a spawned orchestrator
pub struct MonitorHandle {
    trigger: mpsc::Sender<()>,
    shutdown: watch::Sender<bool>,
    updates: watch::Receiver<StatusSnapshot>,
    store: StatusStore,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Request an immediate cycle.
    ///
    /// Returns false if a request is already pending.
    pub fn scrape_now(&self) -> bool {
        self.trigger.try_send(()).is_ok()
    }

    /// Receive a snapshot after every completed cycle
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.updates.clone()
    }

    /// Current status
    pub fn snapshot(&self) -> StatusSnapshot {
        self.store.snapshot()
    }

    /// Stop the loop and wait for an in-flight cycle to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("Scheduler task ended abnormally: {}", e);
        }
    }
}
