use crate::config::types::{Config, RotationConfig, WatchConfig};
use crate::history::RingHistory;
use crate::rotation::{check_and_rotate_at, compress_file, CompressionError, RotationError};
use crate::source::classifier::{LineClassifier, LogRecord};
use crate::source::tail::{file_size, TailError, WindowedTailReader};
use crate::watcher::clock::{Clock, SystemClock};
use crate::watcher::events::{EventSink, WatchEvent};
use crate::watcher::stats::{Statistics, StatisticsReport};
use crate::watcher::subscription::{ChangeNotifier, ChangeTrigger, FsNotifier, Subscription};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A heartbeat finding no completed cycle for this many intervals is a stall.
const STALL_INTERVALS: i64 = 3;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("tail read failed: {0}")]
    Tail(#[from] TailError),

    #[error("rotation failed: {0}")]
    Rotation(#[from] RotationError),

    #[error("compression failed: {0}")]
    Compression(#[from] CompressionError),

    #[error("file subscription failed: {0}")]
    Subscription(#[from] notify::Error),

    #[error("watcher failed to start: {source}")]
    Startup {
        #[source]
        source: Box<WatchError>,
    },

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Stopped,
    Starting,
    Running,
    Restarting,
}

/// Collaborators a supervisor talks to. One per watcher instance; nothing is
/// process-global, so independent watchers can share a process.
#[derive(Clone)]
pub struct WatchContext {
    pub clock: Arc<dyn Clock>,
    pub events: Arc<dyn EventSink>,
    pub notifier: Arc<dyn ChangeNotifier>,
}

impl WatchContext {
    /// Wall clock and real filesystem notifications.
    pub fn system(events: Arc<dyn EventSink>) -> Self {
        Self {
            clock: Arc::new(SystemClock),
            events,
            notifier: Arc::new(FsNotifier),
        }
    }
}

/// Resources bound to one Running period. Replaced wholesale on restart.
struct Lifecycle {
    generation: u64,
    armed_at: i64,
    _subscription: Subscription,
    heartbeat: CancellationToken,
}

impl Lifecycle {
    fn cancel(self) {
        self.heartbeat.cancel();
        // Dropping the subscription unsubscribes
    }
}

struct CompressionOutcome {
    path: PathBuf,
    result: Result<PathBuf, CompressionError>,
}

/// Receiving ends of everything that wakes the supervisor's loop.
struct Triggers {
    changes: mpsc::Receiver<u64>,
    heartbeats: mpsc::Receiver<u64>,
    compressions: mpsc::UnboundedReceiver<CompressionOutcome>,
}

impl Triggers {
    /// Empty the single-slot channels so a leftover message from a torn-down
    /// lifecycle cannot swallow the first notification of the next one.
    fn discard_pending(&mut self) -> usize {
        let mut discarded = 0;
        while self.changes.try_recv().is_ok() {
            discarded += 1;
        }
        while self.heartbeats.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }
}

struct TriggerSenders {
    changes: mpsc::Sender<u64>,
    heartbeats: mpsc::Sender<u64>,
    compressions: mpsc::UnboundedSender<CompressionOutcome>,
}

/// Watches one log file: backfill, change-driven cycles, rotation and
/// heartbeat-driven self-restart.
///
/// Every cycle samples the last `cycle_lines` lines of the file. Nothing
/// tracks which lines an earlier cycle already took, so a line still inside
/// that tail is classified, stored and counted again on the next cycle.
/// Only rotation (which empties the file) moves the window past old lines.
///
/// All state is mutated through `&mut self`, so cycles can never overlap.
/// [`crate::watcher::spawn`] drives a supervisor from a single tokio task;
/// the methods here can also be called directly.
pub struct WatchSupervisor {
    id: Uuid,
    watch: WatchConfig,
    rotation: RotationConfig,
    context: WatchContext,
    reader: WindowedTailReader,
    classifier: LineClassifier,
    history: RingHistory<LogRecord>,
    stats: Statistics,
    phase: Phase,
    lifecycle: Option<Lifecycle>,
    generation: u64,
    senders: TriggerSenders,
    triggers: Triggers,
}

impl WatchSupervisor {
    pub fn new(config: &Config, context: WatchContext) -> Self {
        let (changes_tx, changes_rx) = mpsc::channel(1);
        let (heartbeats_tx, heartbeats_rx) = mpsc::channel(1);
        let (compressions_tx, compressions_rx) = mpsc::unbounded_channel();

        let now = context.clock.now_millis();

        Self {
            id: Uuid::new_v4(),
            reader: WindowedTailReader::new(&config.watch.path, config.watch.buffer_size),
            classifier: LineClassifier::new(),
            history: RingHistory::new(config.watch.max_lines),
            stats: Statistics::new(now),
            phase: Phase::Stopped,
            lifecycle: None,
            generation: 0,
            senders: TriggerSenders {
                changes: changes_tx,
                heartbeats: heartbeats_tx,
                compressions: compressions_tx,
            },
            triggers: Triggers {
                changes: changes_rx,
                heartbeats: heartbeats_rx,
                compressions: compressions_rx,
            },
            watch: config.watch.clone(),
            rotation: config.rotation.clone(),
            context,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn path(&self) -> &Path {
        &self.watch.path
    }

    /// Generation of the active subscription and heartbeat, if any.
    pub fn lifecycle_generation(&self) -> Option<u64> {
        self.lifecycle.as_ref().map(|lifecycle| lifecycle.generation)
    }

    /// Retained records, oldest first.
    pub fn snapshot(&self) -> impl Iterator<Item = &LogRecord> + Clone + '_ {
        self.history.snapshot()
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    /// Statistics plus buffer occupancy and the current file size (0 when
    /// the file cannot be stat'ed).
    pub async fn statistics(&self) -> StatisticsReport {
        let size = file_size(&self.watch.path).await.unwrap_or(0);

        StatisticsReport::new(&self.stats, self.history.len(), self.history.capacity(), size)
    }

    /// Stopped -> Starting -> Running.
    ///
    /// Does nothing unless Stopped. On failure an `Error` event is emitted,
    /// the supervisor is Stopped again, and `WatchError::Startup` is returned
    /// for the caller to escalate.
    pub async fn start(&mut self) -> Result<(), WatchError> {
        if self.phase != Phase::Stopped {
            debug!(watcher = %self.id, phase = ?self.phase, "Start ignored, watcher not stopped");
            return Ok(());
        }

        self.bring_up().await
    }

    /// Tear down the active lifecycle and bring it up again from a fresh
    /// backfill. Statistics carry over.
    pub async fn restart(&mut self) -> Result<(), WatchError> {
        info!(watcher = %self.id, path = %self.watch.path.display(), "Restarting watcher");
        self.phase = Phase::Restarting;
        self.teardown();

        self.bring_up().await?;
        self.emit(WatchEvent::Restarted);
        Ok(())
    }

    /// Cancel the heartbeat and subscription and emit `Stopped`. No-op when
    /// already stopped.
    pub fn stop(&mut self) {
        if self.phase == Phase::Stopped {
            return;
        }

        self.teardown();
        self.phase = Phase::Stopped;
        info!(watcher = %self.id, "Watcher stopped");
        self.emit(WatchEvent::Stopped);
    }

    /// Run one watch cycle. Failures become `Error` events; the phase is
    /// never changed by a failed cycle.
    pub async fn run_cycle(&mut self) {
        if self.phase != Phase::Running {
            debug!(watcher = %self.id, phase = ?self.phase, "Cycle skipped, watcher not running");
            return;
        }

        if let Err(e) = self.watch_cycle().await {
            warn!(watcher = %self.id, error = %e, "Watch cycle failed");
            self.emit(WatchEvent::Error {
                message: e.to_string(),
            });
        }
    }

    /// Heartbeat tick: restart if no cycle completed for three intervals.
    ///
    /// An error means the restart itself failed and the watcher is Stopped.
    pub async fn check_heartbeat(&mut self) -> Result<(), WatchError> {
        if self.phase != Phase::Running {
            return Ok(());
        }
        let Some(lifecycle) = &self.lifecycle else {
            return Ok(());
        };

        let now = self.context.clock.now_millis();
        let reference = self.stats.last_update_time.max(lifecycle.armed_at);
        let limit = millis(self.watch.heartbeat_interval).saturating_mul(STALL_INTERVALS);

        if now.saturating_sub(reference) > limit {
            warn!(
                watcher = %self.id,
                idle_ms = now.saturating_sub(reference),
                limit_ms = limit,
                "Watcher stalled"
            );
            self.emit(WatchEvent::Stalled);
            self.restart().await?;
        }

        Ok(())
    }

    /// Drive this supervisor until stopped: start, then serve change
    /// notifications, heartbeat ticks and commands one at a time.
    ///
    /// Notifications that arrive mid-cycle coalesce into one pending cycle.
    /// Anything tagged with an older lifecycle generation is discarded.
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<crate::watcher::runner::Command>,
    ) -> Result<(), WatchError> {
        use crate::watcher::runner::Command;

        self.start().await?;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Statistics(reply)) => {
                        let _ = reply.send(self.statistics().await);
                    }
                    Some(Command::Snapshot(reply)) => {
                        let _ = reply.send(self.snapshot().cloned().collect());
                    }
                    Some(Command::Stop) | None => {
                        self.stop();
                        return Ok(());
                    }
                },
                Some(generation) = self.triggers.changes.recv() => {
                    if self.is_current(generation) {
                        self.run_cycle().await;
                    }
                }
                Some(generation) = self.triggers.heartbeats.recv() => {
                    if self.is_current(generation) {
                        self.check_heartbeat().await?;
                    }
                }
                Some(outcome) = self.triggers.compressions.recv() => {
                    self.finish_compression(outcome);
                }
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.phase == Phase::Running && self.lifecycle_generation() == Some(generation)
    }

    async fn bring_up(&mut self) -> Result<(), WatchError> {
        self.phase = Phase::Starting;

        match self.backfill_and_arm().await {
            Ok(()) => {
                self.phase = Phase::Running;
                info!(
                    watcher = %self.id,
                    path = %self.watch.path.display(),
                    records = self.history.len(),
                    generation = self.generation,
                    "Watcher started"
                );
                self.emit(WatchEvent::Snapshot {
                    records: self.history.snapshot().cloned().collect(),
                    stats: self.stats.clone(),
                });
                self.emit(WatchEvent::Started);
                Ok(())
            }
            Err(e) => {
                error!(watcher = %self.id, path = %self.watch.path.display(), error = %e, "Watcher failed to start");
                self.teardown();
                self.phase = Phase::Stopped;
                self.emit(WatchEvent::Error {
                    message: e.to_string(),
                });
                Err(WatchError::Startup {
                    source: Box::new(e),
                })
            }
        }
    }

    async fn backfill_and_arm(&mut self) -> Result<(), WatchError> {
        let lines = self.reader.read_last_lines(self.watch.max_lines).await?;
        let now = self.context.clock.now_millis();

        let mut history = RingHistory::new(self.watch.max_lines);
        for line in &lines {
            match self.classifier.classify(line, now) {
                Ok(record) => {
                    self.stats.record(record.severity);
                    history.push(record);
                }
                Err(reason) => debug!(watcher = %self.id, %reason, "Dropping malformed line"),
            }
        }
        self.history = history;

        let discarded = self.triggers.discard_pending();
        if discarded > 0 {
            debug!(watcher = %self.id, discarded, "Discarded triggers from previous lifecycle");
        }

        self.generation += 1;
        let generation = self.generation;

        let subscription = self.context.notifier.subscribe(
            &self.watch.path,
            ChangeTrigger::new(generation, self.senders.changes.clone()),
        )?;
        let heartbeat = self.arm_heartbeat(generation);

        self.lifecycle = Some(Lifecycle {
            generation,
            armed_at: now,
            _subscription: subscription,
            heartbeat,
        });

        Ok(())
    }

    fn arm_heartbeat(&self, generation: u64) -> CancellationToken {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let sender = self.senders.heartbeats.clone();
        let period = self.watch.heartbeat_interval.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        // A tick still queued is as good as a new one
                        let _ = sender.try_send(generation);
                    }
                }
            }
        });

        token
    }

    fn teardown(&mut self) {
        if let Some(lifecycle) = self.lifecycle.take() {
            debug!(watcher = %self.id, generation = lifecycle.generation, "Cancelling subscription and heartbeat");
            lifecycle.cancel();
        }
    }

    async fn watch_cycle(&mut self) -> Result<(), WatchError> {
        let size = file_size(&self.watch.path).await?;
        if size == 0 {
            return Ok(());
        }

        let lines = self.reader.read_last_lines(self.watch.cycle_lines).await?;
        let now = self.context.clock.now_millis();

        let mut accepted = Vec::new();
        for line in &lines {
            match self.classifier.classify(line, now) {
                Ok(record) => {
                    self.stats.record(record.severity);
                    self.history.push(record.clone());
                    accepted.push(record);
                }
                Err(reason) => debug!(watcher = %self.id, %reason, "Dropping malformed line"),
            }
        }

        self.stats.mark_update(now);

        if !accepted.is_empty() {
            debug!(watcher = %self.id, records = accepted.len(), "Watch cycle accepted records");
            self.emit(WatchEvent::Update {
                records: accepted,
                stats: self.stats.clone(),
            });
        }

        let rotated =
            check_and_rotate_at(&self.watch.path, self.rotation.threshold_bytes, now).await?;
        if let Some(path) = rotated {
            self.emit(WatchEvent::Rotated { path: path.clone() });
            if self.rotation.compression {
                self.spawn_compression(path);
            }
        }

        Ok(())
    }

    /// Compress in the background; the outcome comes back through the loop.
    fn spawn_compression(&self, path: PathBuf) {
        let sender = self.senders.compressions.clone();

        tokio::spawn(async move {
            let result = compress_file(&path).await;
            let _ = sender.send(CompressionOutcome { path, result });
        });
    }

    fn finish_compression(&mut self, outcome: CompressionOutcome) {
        match outcome.result {
            Ok(archive) => {
                debug!(watcher = %self.id, archive = %archive.display(), "Compression finished");
            }
            Err(e) => {
                warn!(watcher = %self.id, path = %outcome.path.display(), error = %e, "Compression failed");
                // A restart in between does not hide the failure
                if self.phase == Phase::Running {
                    self.emit(WatchEvent::Error {
                        message: WatchError::from(e).to_string(),
                    });
                }
            }
        }
    }

    fn emit(&self, event: WatchEvent) {
        self.context.events.emit(event);
    }
}

impl Drop for WatchSupervisor {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
