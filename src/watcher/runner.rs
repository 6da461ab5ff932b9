use crate::source::classifier::LogRecord;
use crate::watcher::stats::StatisticsReport;
use crate::watcher::supervisor::{WatchError, WatchSupervisor};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

pub(crate) enum Command {
    Statistics(oneshot::Sender<StatisticsReport>),
    Snapshot(oneshot::Sender<Vec<LogRecord>>),
    Stop,
}

/// Run a supervisor on its own task.
///
/// Returns immediately; startup happens on the task. If startup fails the
/// task ends with `WatchError::Startup`, observable through
/// [`WatcherHandle::finished`] or [`WatcherHandle::stop`].
pub fn spawn(supervisor: WatchSupervisor) -> WatcherHandle {
    let (commands, receiver) = mpsc::channel(16);
    let task = tokio::spawn(supervisor.run(receiver));

    WatcherHandle { commands, task }
}

/// Control handle for a spawned watcher.
pub struct WatcherHandle {
    commands: mpsc::Sender<Command>,
    task: JoinHandle<Result<(), WatchError>>,
}

impl WatcherHandle {
    /// Current statistics, or `None` once the watcher has exited.
    pub async fn statistics(&self) -> Option<StatisticsReport> {
        let (reply, response) = oneshot::channel();
        self.commands.send(Command::Statistics(reply)).await.ok()?;
        response.await.ok()
    }

    /// Retained records, oldest first, or `None` once the watcher has exited.
    pub async fn snapshot(&self) -> Option<Vec<LogRecord>> {
        let (reply, response) = oneshot::channel();
        self.commands.send(Command::Snapshot(reply)).await.ok()?;
        response.await.ok()
    }

    /// Wait for the watcher task to end on its own, e.g. after a failed
    /// startup or restart. Must not be polled again after it completes.
    pub async fn finished(&mut self) -> Result<(), WatchError> {
        (&mut self.task).await?
    }

    /// Stop the watcher and wait for its task to end.
    pub async fn stop(self) -> Result<(), WatchError> {
        if self.commands.send(Command::Stop).await.is_err() {
            debug!("Watcher loop already exited");
        }
        self.task.await?
    }
}
