/// Watcher Integration Tests
///
/// These tests drive a supervisor through the public API with a manual clock
/// and hand-fired change notifications:
/// - Two cycles with rotation in between
/// - Two cycles without rotation, where the tail is sampled twice
/// - Spawned watcher queried through its handle
/// - Rotation followed by background compression
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tailwatch::config::Config;
use tailwatch::source::Severity;
use tailwatch::watcher::{
    self, ChangeNotifier, ChangeTrigger, EventBus, ManualClock, Phase, Subscription,
    WatchContext, WatchEvent, WatchSupervisor,
};
use tempfile::TempDir;
use tokio::sync::broadcast;

#[cfg(test)]
mod tests {
    use super::*;

    /// Keeps every trigger it is handed so the test can fire the latest one.
    #[derive(Default)]
    struct RecordingNotifier {
        triggers: Mutex<Vec<ChangeTrigger>>,
    }

    impl RecordingNotifier {
        fn fire_latest(&self) {
            let triggers = self.triggers.lock().unwrap();
            triggers.last().expect("no subscription yet").fire();
        }
    }

    impl ChangeNotifier for RecordingNotifier {
        fn subscribe(
            &self,
            _path: &Path,
            trigger: ChangeTrigger,
        ) -> Result<Subscription, notify::Error> {
            self.triggers.lock().unwrap().push(trigger);
            Ok(Subscription::new(()))
        }
    }

    struct Setup {
        _dir: TempDir,
        dir_path: PathBuf,
        path: PathBuf,
        clock: Arc<ManualClock>,
        notifier: Arc<RecordingNotifier>,
        events: broadcast::Receiver<WatchEvent>,
        supervisor: WatchSupervisor,
    }

    fn setup(configure: impl FnOnce(&mut Config)) -> Setup {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("service.log");
        std::fs::write(&path, "").unwrap();

        let mut config = Config::default();
        config.watch.path = path.clone();
        configure(&mut config);

        let clock = Arc::new(ManualClock::new(1_000));
        let notifier = Arc::new(RecordingNotifier::default());
        let bus = EventBus::new(256);
        let events = bus.subscribe();

        let supervisor = WatchSupervisor::new(
            &config,
            WatchContext {
                clock: clock.clone(),
                events: Arc::new(bus),
                notifier: notifier.clone(),
            },
        );

        Setup {
            dir_path: dir.path().to_path_buf(),
            _dir: dir,
            path,
            clock,
            notifier,
            events,
            supervisor,
        }
    }

    fn append(path: &Path, lines: &[&str]) {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(path)
            .unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
    }

    /// Wait for the next event with the given name, skipping others.
    async fn next_named(events: &mut broadcast::Receiver<WatchEvent>, name: &str) -> WatchEvent {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = events.recv().await.unwrap();
                if event.name() == name {
                    return event;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for '{}' event", name))
    }

    async fn wait_for(condition: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not met in time");
    }

    #[tokio::test]
    async fn test_two_cycles_accumulate_statistics_in_order() {
        // Rotation after the first cycle keeps the second from re-reading it
        let mut s = setup(|config| config.rotation.threshold_bytes = 20);
        s.supervisor.start().await.unwrap();

        append(&s.path, &["100 [INFO] a", "200 [ERROR] b"]);
        s.clock.set(2_000);
        s.supervisor.run_cycle().await;

        append(&s.path, &["300 [WARNING] c"]);
        s.clock.set(3_000);
        s.supervisor.run_cycle().await;

        let report = s.supervisor.statistics().await;
        assert_eq!(report.total_lines, 3);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.warning_count, 1);
        assert_eq!(report.current_buffer_size, 3);

        let records: Vec<_> = s
            .supervisor
            .snapshot()
            .map(|r| (r.content.as_str(), r.timestamp, r.severity))
            .collect();
        assert_eq!(
            records,
            vec![
                ("100 [INFO] a", 100, Severity::Info),
                ("200 [ERROR] b", 200, Severity::Error),
                ("300 [WARNING] c", 300, Severity::Warning),
            ]
        );

        assert!(s.dir_path.join("service.log.2000").exists());
        assert!(!s.dir_path.join("service.log.3000").exists());
    }

    #[tokio::test]
    async fn test_cycles_without_rotation_recount_lines_still_in_the_tail() {
        let mut s = setup(|_| {});
        s.supervisor.start().await.unwrap();

        append(&s.path, &["100 [INFO] a", "200 [ERROR] b"]);
        s.clock.set(2_000);
        s.supervisor.run_cycle().await;

        append(&s.path, &["300 [WARNING] c"]);
        s.clock.set(3_000);
        s.supervisor.run_cycle().await;

        // The second cycle samples all three lines again; nothing dedups them
        let report = s.supervisor.statistics().await;
        assert_eq!(report.total_lines, 5);
        assert_eq!(report.error_count, 2);
        assert_eq!(report.warning_count, 1);

        let contents: Vec<_> = s.supervisor.snapshot().map(|r| r.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "100 [INFO] a",
                "200 [ERROR] b",
                "100 [INFO] a",
                "200 [ERROR] b",
                "300 [WARNING] c",
            ]
        );
    }

    #[tokio::test]
    async fn test_spawned_watcher_serves_queries_and_stops() {
        let mut s = setup(|config| config.rotation.threshold_bytes = 20);
        append(&s.path, &["1 [INFO] backfilled"]);

        let notifier = s.notifier.clone();
        let path = s.path.clone();
        let handle = watcher::spawn(s.supervisor);

        match next_named(&mut s.events, "snapshot").await {
            WatchEvent::Snapshot { records, .. } => assert_eq!(records.len(), 1),
            other => panic!("expected snapshot, got {:?}", other),
        }
        next_named(&mut s.events, "started").await;

        append(&path, &["2 [ERROR] live"]);
        notifier.fire_latest();

        match next_named(&mut s.events, "update").await {
            WatchEvent::Update { records, stats } => {
                assert!(records.iter().any(|r| r.content == "2 [ERROR] live"));
                assert_eq!(stats.error_count, 1);
            }
            other => panic!("expected update, got {:?}", other),
        }
        next_named(&mut s.events, "rotated").await;

        let report = handle.statistics().await.unwrap();
        assert_eq!(report.error_count, 1);
        assert_eq!(report.file_size, 0);

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(
            snapshot.last().map(|r| r.content.as_str()),
            Some("2 [ERROR] live")
        );

        handle.stop().await.unwrap();
        next_named(&mut s.events, "stopped").await;
    }

    #[tokio::test]
    async fn test_spawned_watcher_reports_startup_failure() {
        let s = setup(|_| {});
        std::fs::remove_file(&s.path).unwrap();

        let mut handle = watcher::spawn(s.supervisor);
        let result = handle.finished().await;

        assert!(matches!(
            result,
            Err(tailwatch::watcher::WatchError::Startup { .. })
        ));
    }

    #[tokio::test]
    async fn test_rotation_with_compression_replaces_rotated_file() {
        let mut s = setup(|config| {
            config.rotation.threshold_bytes = 1;
            config.rotation.compression = true;
        });

        let notifier = s.notifier.clone();
        let clock = s.clock.clone();
        let path = s.path.clone();
        let handle = watcher::spawn(s.supervisor);
        next_named(&mut s.events, "started").await;

        append(&path, &["1 [INFO] archive me"]);
        clock.set(5_000);
        notifier.fire_latest();

        let rotated = match next_named(&mut s.events, "rotated").await {
            WatchEvent::Rotated { path } => path,
            other => panic!("expected rotated, got {:?}", other),
        };
        assert_eq!(rotated, s.dir_path.join("service.log.5000"));

        let archive = s.dir_path.join("service.log.5000.gz");
        wait_for(|| archive.exists() && !rotated.exists()).await;

        let report = handle.statistics().await.unwrap();
        assert_eq!(report.total_lines, 1);

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_keeps_counting() {
        let mut s = setup(|config| config.watch.heartbeat_interval = Duration::from_millis(100));
        append(&s.path, &["1 [WARNING] w"]);
        s.supervisor.start().await.unwrap();

        s.clock.advance(301);
        s.supervisor.check_heartbeat().await.unwrap();

        assert_eq!(s.supervisor.phase(), Phase::Running);
        assert_eq!(s.supervisor.stats().warning_count, 2);
        assert_eq!(s.notifier.triggers.lock().unwrap().len(), 2);

        next_named(&mut s.events, "stalled").await;
        next_named(&mut s.events, "restarted").await;
    }
}
