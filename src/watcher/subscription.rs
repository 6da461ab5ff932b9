use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Wakes the supervisor's loop for one watcher lifecycle.
///
/// The underlying channel holds a single pending notification; firing while
/// one is already queued coalesces into it.
#[derive(Debug, Clone)]
pub struct ChangeTrigger {
    generation: u64,
    sender: mpsc::Sender<u64>,
}

impl ChangeTrigger {
    pub(crate) fn new(generation: u64, sender: mpsc::Sender<u64>) -> Self {
        Self { generation, sender }
    }

    /// Returns false if the notification was coalesced or the loop is gone.
    pub fn fire(&self) -> bool {
        self.sender.try_send(self.generation).is_ok()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Active file-change subscription. Dropping it unsubscribes.
pub struct Subscription {
    _guard: Mutex<Box<dyn Send>>,
}

impl Subscription {
    pub fn new<G: Send + 'static>(guard: G) -> Self {
        Self {
            _guard: Mutex::new(Box::new(guard)),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Source of file-change notifications.
pub trait ChangeNotifier: Send + Sync {
    fn subscribe(&self, path: &Path, trigger: ChangeTrigger) -> Result<Subscription, notify::Error>;
}

/// Filesystem notifications through `notify`.
///
/// Watches the parent directory and filters on the file name, so the file
/// recreated after a rotation keeps producing notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsNotifier;

impl ChangeNotifier for FsNotifier {
    fn subscribe(&self, path: &Path, trigger: ChangeTrigger) -> Result<Subscription, notify::Error> {
        let target = std::fs::canonicalize(path).map_err(notify::Error::io)?;
        let file_name = target.file_name().map(|name| name.to_os_string());
        let directory = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    if !is_content_change(&event.kind) {
                        return;
                    }
                    let touches_target = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if touches_target && !trigger.fire() {
                        debug!("Change notification coalesced into pending cycle");
                    }
                }
                Err(e) => warn!(error = %e, "File watch error"),
            }
        })?;

        watcher.watch(&directory, RecursiveMode::NonRecursive)?;
        debug!(directory = %directory.display(), "Subscribed to file changes");

        Ok(Subscription::new::<RecommendedWatcher>(watcher))
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Modify(_) | EventKind::Create(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    #[test]
    fn test_trigger_coalesces_pending_notifications() {
        let (sender, mut receiver) = mpsc::channel(1);
        let trigger = ChangeTrigger::new(3, sender);

        assert!(trigger.fire());
        assert!(!trigger.fire());

        assert_eq!(receiver.try_recv().unwrap(), 3);
        assert!(receiver.try_recv().is_err());
        assert!(trigger.fire());
    }

    #[test]
    fn test_content_change_kinds() {
        assert!(is_content_change(&EventKind::Modify(ModifyKind::Any)));
        assert!(is_content_change(&EventKind::Create(CreateKind::File)));
        assert!(!is_content_change(&EventKind::Access(AccessKind::Any)));
    }

    #[test]
    fn test_subscribe_missing_file_fails() {
        let (sender, _receiver) = mpsc::channel(1);
        let result = FsNotifier.subscribe(
            Path::new("/nonexistent/tailwatch/app.log"),
            ChangeTrigger::new(1, sender),
        );
        assert!(result.is_err());
    }
}
