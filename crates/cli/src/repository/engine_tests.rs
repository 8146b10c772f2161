// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used, clippy::panic)]

use super::*;
use crate::repository::test_helpers::{bob, fast_timing, fixture, fixture_with, me, FAKE_STATE_DIR};
use drift_core::ChangeType;
use std::fs;
use tempfile::TempDir;

fn drain(rx: &mut broadcast::Receiver<RepositoryEvent>) -> Vec<RepositoryEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

fn new_change_sets(events: &[RepositoryEvent]) -> Vec<ChangeSet> {
    events
        .iter()
        .filter_map(|e| match e {
            RepositoryEvent::NewChangeSet(cs) => Some(cs.clone()),
            _ => None,
        })
        .collect()
}

fn activity(path: &str) -> FileActivity {
    FileActivity {
        paths: vec![PathBuf::from(path)],
    }
}

#[test]
fn poll_interval_switches_between_short_and_long() {
    let now = Instant::now();
    let mut poll = PollInterval::new(Duration::from_secs(300), Duration::from_secs(900), now);
    assert_eq!(poll.current(), Duration::from_secs(300));
    assert!(!poll.is_due(now + Duration::from_secs(299)));
    assert!(poll.is_due(now + Duration::from_secs(300)));

    poll.lengthen();
    assert!(!poll.is_due(now + Duration::from_secs(300)));
    poll.checked(now + Duration::from_secs(300));
    poll.shorten();
    assert!(poll.is_due(now + Duration::from_secs(600)));
}

#[test]
fn progress_never_goes_backwards() {
    let (tx, mut rx) = broadcast::channel(16);
    let tracker = ProgressTracker::new(tx);
    tracker.progress(10.0, None, "a");
    tracker.progress(60.0, Some("1 MB/s"), "b");
    tracker.progress(30.0, None, "c");
    tracker.progress(250.0, None, "d");

    let seen: Vec<f64> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            RepositoryEvent::ProgressChanged(p) => Some(p.percentage),
            _ => None,
        })
        .collect();
    assert_eq!(seen, vec![10.0, 60.0, 100.0]);

    tracker.reset();
    assert_eq!(tracker.snapshot(), Progress::default());
    tracker.progress(5.0, None, "again");
    assert_eq!(tracker.snapshot().percentage, 5.0);
}

#[tokio::test]
async fn initialize_fetches_before_sending() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    fs::write(dir.path().join("mine.txt"), "local").unwrap();
    f.backend.push_remote(bob(), &[("theirs.txt", "remote")]);

    f.engine.initialize().await;

    assert_eq!(f.backend.calls(), vec!["down", "up"]);
    assert_eq!(f.engine.status(), SyncStatus::Idle);
    assert_eq!(f.engine.change_sets().len(), 2);
    assert!(dir.path().join(MARKER_FILE_NAME).exists());
}

#[tokio::test]
async fn initialize_while_paused_only_loads_history() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), true);
    fs::write(dir.path().join("mine.txt"), "local").unwrap();
    f.backend.push_remote(bob(), &[("theirs.txt", "remote")]);

    f.engine.initialize().await;

    assert!(f.backend.calls().is_empty());
    assert_eq!(f.engine.status(), SyncStatus::Paused);
}

#[tokio::test]
async fn a_burst_of_activity_is_sent_once() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    f.engine.arm();
    let mut rx = f.engine.subscribe();

    fs::write(dir.path().join("a.txt"), "a").unwrap();
    fs::write(dir.path().join("b.txt"), "b").unwrap();
    tokio::join!(
        f.engine.on_file_activity(activity("a.txt")),
        f.engine.on_file_activity(activity("b.txt")),
        f.engine.on_file_activity(activity("a.txt")),
    );

    assert_eq!(f.backend.count("up"), 1);
    let history = f.backend.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].changes.len(), 2);
    assert!(history[0]
        .changes
        .iter()
        .all(|c| c.change_type == ChangeType::Added));
    let detected = drain(&mut rx)
        .into_iter()
        .filter(|e| *e == RepositoryEvent::ChangesDetected)
        .count();
    assert_eq!(detected, 1);
    assert!(f.engine.gate().is_enabled());
    assert!(!f.engine.is_buffering());
}

#[tokio::test]
async fn excluded_activity_is_ignored() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    let mut rx = f.engine.subscribe();
    fs::write(dir.path().join("a.txt"), "a").unwrap();

    f.engine
        .on_file_activity(activity(&format!("{}/state", FAKE_STATE_DIR)))
        .await;

    assert!(drain(&mut rx).is_empty());
    assert!(f.backend.calls().is_empty());
}

#[tokio::test]
async fn activity_during_a_sync_is_not_reported() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    let mut rx = f.engine.subscribe();
    fs::write(dir.path().join("a.txt"), "a").unwrap();

    let _syncing = f.engine.try_begin().unwrap();
    f.engine.on_file_activity(activity("a.txt")).await;

    assert!(drain(&mut rx).is_empty());
    assert!(f.backend.calls().is_empty());
}

#[tokio::test]
async fn activity_while_paused_is_only_reported() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), true);
    let mut rx = f.engine.subscribe();
    fs::write(dir.path().join("a.txt"), "a").unwrap();

    f.engine.on_file_activity(activity("a.txt")).await;

    assert_eq!(drain(&mut rx), vec![RepositoryEvent::ChangesDetected]);
    assert!(f.backend.calls().is_empty());
}

#[tokio::test]
async fn pause_and_resume_persist_and_flush() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);

    f.engine.pause().unwrap();
    assert!(f.engine.is_paused());
    fs::write(dir.path().join("a.txt"), "a").unwrap();

    f.engine.resume(Some("back from the trip".into())).await.unwrap();

    assert_eq!(
        *f.store.paused.lock().unwrap(),
        vec![("photos".to_string(), true), ("photos".to_string(), false)]
    );
    assert_eq!(f.engine.status(), SyncStatus::Idle);
    assert_eq!(
        f.backend.messages(),
        vec![Some("back from the trip".to_string())]
    );
}

#[tokio::test]
async fn pause_is_refused_unless_idle() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    f.backend.fail_next_up(ErrorStatus::UnreadableFiles);
    f.engine.sync_up(None).await;

    assert!(matches!(f.engine.pause(), Err(Error::CannotPause(s)) if s == "error"));
    assert!(f.store.paused.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failed_send_fetches_then_retries_once() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    f.backend.fail_next_up(ErrorStatus::Unknown);

    assert!(f.engine.sync_up(None).await);

    assert_eq!(f.backend.calls(), vec!["up", "down", "up"]);
    assert_eq!(f.engine.status(), SyncStatus::Idle);
    assert_eq!(f.engine.error_status(), ErrorStatus::None);
    assert!(!f.backend.has_unsynced_changes());
}

#[tokio::test]
async fn second_failed_send_is_an_error() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    f.backend.fail_next_up(ErrorStatus::Unknown);
    f.backend.fail_next_up(ErrorStatus::DiskSpaceExceeded);

    assert!(!f.engine.sync_up(None).await);

    assert_eq!(f.backend.calls(), vec!["up", "down", "up"]);
    assert_eq!(f.engine.status(), SyncStatus::Error);
    assert_eq!(f.engine.error_status(), ErrorStatus::DiskSpaceExceeded);
    assert!(f.backend.has_unsynced_changes());
    assert_eq!(f.engine.poll_interval(), fast_timing().poll_short);
}

#[tokio::test]
async fn failed_fetch_after_failed_send_reports_the_send_error() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    f.backend.fail_next_up(ErrorStatus::Unknown);
    f.backend.fail_next_down(ErrorStatus::HostUnreachable);

    assert!(!f.engine.sync_up(None).await);

    assert_eq!(f.backend.calls(), vec!["up", "down"]);
    assert_eq!(f.engine.status(), SyncStatus::Error);
    assert_eq!(f.engine.error_status(), ErrorStatus::Unknown);
}

#[tokio::test]
async fn send_pending_reports_nothing_to_send_and_failures() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    assert!(!f.engine.send_pending(None).await.unwrap());
    assert!(f.backend.calls().is_empty());

    fs::write(dir.path().join("a.txt"), "a").unwrap();
    assert!(f.engine.send_pending(Some("one".into())).await.unwrap());
    assert_eq!(f.backend.messages(), vec![Some("one".to_string())]);

    fs::write(dir.path().join("b.txt"), "b").unwrap();
    f.backend.fail_next_up(ErrorStatus::UnreadableFiles);
    match f.engine.send_pending(None).await {
        Err(Error::Sync(failure)) => assert_eq!(failure.status, ErrorStatus::UnreadableFiles),
        other => panic!("expected a sync failure, got {other:?}"),
    }
}

#[tokio::test]
async fn unreadable_files_are_not_retried() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    f.backend.fail_next_up(ErrorStatus::UnreadableFiles);

    assert!(!f.engine.sync_up(None).await);

    assert_eq!(f.backend.calls(), vec!["up"]);
    assert_eq!(f.engine.error_status(), ErrorStatus::UnreadableFiles);
}

#[tokio::test]
async fn force_retry_only_acts_on_errors() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    fs::write(dir.path().join("a.txt"), "a").unwrap();

    assert!(!f.engine.force_retry().await);
    assert!(f.backend.calls().is_empty());

    f.backend.fail_next_up(ErrorStatus::UnreadableFiles);
    f.engine.sync_up(None).await;
    assert_eq!(f.engine.status(), SyncStatus::Error);

    assert!(f.engine.force_retry().await);
    assert_eq!(f.engine.status(), SyncStatus::Idle);
    assert_eq!(f.engine.error_status(), ErrorStatus::None);
}

#[tokio::test]
async fn sync_statuses_are_reported_in_order() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    let mut rx = f.engine.subscribe();
    fs::write(dir.path().join("a.txt"), "a").unwrap();

    f.engine.sync_up(None).await;

    let statuses: Vec<SyncStatus> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            RepositoryEvent::SyncStatusChanged(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(statuses, vec![SyncStatus::SyncUp, SyncStatus::Idle]);
}

#[tokio::test]
async fn successful_send_announces_and_lengthens_polling() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    fs::write(dir.path().join("a.txt"), "a").unwrap();

    f.engine.sync_up(None).await;

    assert_eq!(
        *f.listener.announced.lock().unwrap(),
        vec![Announcement::new("f".repeat(64), "r1")]
    );
    assert_eq!(f.engine.poll_interval(), fast_timing().poll_long);

    f.engine
        .on_listener_event(ListenerEvent::Disconnected(DisconnectReason::TimeOut))
        .await;
    assert_eq!(f.engine.poll_interval(), fast_timing().poll_short);
}

#[tokio::test]
async fn listener_connect_lengthens_polling() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    assert_eq!(f.engine.poll_interval(), fast_timing().poll_short);

    f.engine.on_listener_event(ListenerEvent::Connected).await;

    assert_eq!(f.engine.poll_interval(), fast_timing().poll_long);
    assert!(f.backend.calls().is_empty());
}

#[tokio::test]
async fn change_sets_are_grouped_by_author_and_day() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    let mut rx = f.engine.subscribe();

    f.backend.push_remote(bob(), &[("one.txt", "1")]);
    f.engine.sync_down().await;
    f.backend.push_remote(me(), &[("mine.txt", "m")]);
    f.engine.sync_down().await;
    f.backend.push_remote(bob(), &[("two.txt", "2")]);
    f.engine.sync_down().await;
    f.backend.push_remote(bob(), &[("three.txt", "3")]);
    f.engine.sync_down().await;

    let change_sets = f.engine.change_sets();
    assert_eq!(change_sets.len(), 2);
    let newest = &change_sets[0];
    assert_eq!(newest.user, bob());
    assert_eq!(newest.revision, "r4");
    let paths: Vec<&str> = newest.changes.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(paths, vec!["three.txt", "two.txt", "one.txt"]);
    assert!(newest.first_timestamp.unwrap() < newest.timestamp);

    // Notifications carry only what arrived, not the merged entry.
    let notified = new_change_sets(&drain(&mut rx));
    assert_eq!(notified.len(), 3);
    assert_eq!(notified[2].changes.len(), 1);
    assert_eq!(notified[2].changes[0].path, "three.txt");
}

#[tokio::test]
async fn foreign_change_sets_are_notified() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    let mut rx = f.engine.subscribe();
    f.backend.push_remote(bob(), &[("theirs.txt", "remote")]);

    assert!(f.engine.sync_down().await);

    let notified = new_change_sets(&drain(&mut rx));
    assert_eq!(notified.len(), 1);
    assert_eq!(notified[0].user, bob());
    assert_eq!(notified[0].folder.as_deref(), Some("photos"));
    assert_eq!(notified[0].remote_url.as_deref(), Some("ssh://host/photos"));
    assert_eq!(
        fs::read_to_string(dir.path().join("theirs.txt")).unwrap(),
        "remote"
    );
}

#[tokio::test]
async fn own_and_marker_only_change_sets_are_not_notified() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    let mut rx = f.engine.subscribe();

    f.backend.push_remote(me(), &[("mine.txt", "from laptop")]);
    f.engine.sync_down().await;
    f.backend.push_remote(
        User::new("Alice at work", "ALICE@example.com"),
        &[("work.txt", "x")],
    );
    f.engine.sync_down().await;
    f.backend.push_remote_marker_restamp(bob());
    f.engine.sync_down().await;

    assert!(new_change_sets(&drain(&mut rx)).is_empty());
    assert_eq!(f.engine.change_sets().len(), 3);
}

#[tokio::test]
async fn repeated_fetch_without_remote_changes_is_quiet() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    f.backend.push_remote(bob(), &[("theirs.txt", "remote")]);
    f.engine.sync_down().await;
    let revision = f.engine.current_revision().await;
    let mut rx = f.engine.subscribe();

    assert!(f.engine.sync_down().await);
    assert!(f.engine.sync_down().await);

    assert_eq!(f.engine.current_revision().await, revision);
    assert!(new_change_sets(&drain(&mut rx)).is_empty());
    assert_eq!(f.engine.status(), SyncStatus::Idle);
}

#[tokio::test]
async fn fetch_sends_owed_changes_afterwards() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    f.backend.mark_unsynced();

    f.engine.sync_down().await;

    assert_eq!(f.backend.calls(), vec!["down", "up"]);
    assert!(!f.backend.has_unsynced_changes());
}

#[tokio::test]
async fn announcements_for_other_folders_or_known_revisions_are_ignored() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    f.engine.sync_up(None).await;

    f.engine
        .on_announcement(&Announcement::new("0".repeat(64), "r9"))
        .await;
    f.engine
        .on_announcement(&Announcement::new("f".repeat(64), "r1"))
        .await;
    assert_eq!(f.backend.calls(), vec!["up"]);

    f.engine
        .on_listener_event(ListenerEvent::Announcement(Announcement::new(
            "f".repeat(64),
            "r2",
        )))
        .await;
    assert_eq!(f.backend.calls(), vec!["up", "down"]);
}

#[tokio::test]
async fn announcement_waits_for_the_running_sync() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    f.backend.set_up_delay(Duration::from_millis(200));

    let engine = Arc::clone(&f.engine);
    let up = tokio::spawn(async move { engine.sync_up(None).await });
    while !f.engine.is_syncing() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    f.engine
        .on_announcement(&Announcement::new("f".repeat(64), "r7"))
        .await;

    assert!(up.await.unwrap());
    assert_eq!(f.backend.calls(), vec!["up", "down"]);
}

#[tokio::test]
async fn announcement_while_paused_does_nothing() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), true);
    f.backend.push_remote(bob(), &[("theirs.txt", "remote")]);

    f.engine
        .on_announcement(&Announcement::new("f".repeat(64), "r1"))
        .await;

    assert!(f.backend.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn sleep_recovery_backs_off_then_fetches() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    f.listener.set_connected(false);
    f.listener.connect_on_attempt(7);
    let start = Instant::now();

    f.engine
        .on_listener_event(ListenerEvent::Disconnected(DisconnectReason::SystemSleep))
        .await;

    let offsets: Vec<u64> = f
        .listener
        .reconnects()
        .iter()
        .map(|t| t.duration_since(start).as_secs())
        .collect();
    assert_eq!(offsets, vec![2, 6, 14, 30, 62, 126, 190]);
    assert!(f.backend.calls().is_empty());

    f.engine.on_listener_event(ListenerEvent::Connected).await;
    assert_eq!(f.backend.calls(), vec!["down"]);

    // Only the first connect after a sleep forces a fetch.
    f.engine.on_listener_event(ListenerEvent::Connected).await;
    assert_eq!(f.backend.calls(), vec!["down"]);
}

#[tokio::test]
async fn progress_is_monotonic_and_reset_per_operation() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    f.backend.set_progress_steps(&[10.0, 60.0, 30.0, 100.0]);
    let mut rx = f.engine.subscribe();
    fs::write(dir.path().join("a.txt"), "a").unwrap();

    f.engine.sync_up(None).await;
    f.engine.sync_down().await;

    let seen: Vec<f64> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            RepositoryEvent::ProgressChanged(p) => Some(p.percentage),
            _ => None,
        })
        .collect();
    assert_eq!(seen, vec![10.0, 60.0, 100.0, 10.0, 60.0, 100.0]);
    assert_eq!(f.engine.progress().percentage, 100.0);
}

#[tokio::test]
async fn restore_writes_the_old_version() {
    let dir = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    f.backend.store_version("a.txt", "r1", "first draft");
    let target = out.path().join("a (r1).txt");

    f.engine.restore_file("a.txt", "r1", &target).await.unwrap();
    assert_eq!(fs::read_to_string(&target).unwrap(), "first draft");

    let err = f
        .engine
        .restore_file("a.txt", "r9", &target)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Sync(ref e) if e.status == ErrorStatus::NotFound));
}

#[tokio::test]
async fn due_poll_fetches_and_lengthens_when_connected() {
    let dir = TempDir::new().unwrap();
    let timing = Timing {
        poll_short: Duration::ZERO,
        ..fast_timing()
    };
    let f = fixture_with(dir.path(), false, timing.clone());
    f.backend.push_remote(bob(), &[("theirs.txt", "remote")]);

    f.engine.poll_tick().await;

    assert_eq!(f.backend.calls(), vec!["down"]);
    assert_eq!(f.engine.poll_interval(), timing.poll_long);
}

#[tokio::test]
async fn due_poll_sends_local_changes_first() {
    let dir = TempDir::new().unwrap();
    let timing = Timing {
        poll_short: Duration::ZERO,
        ..fast_timing()
    };
    let f = fixture_with(dir.path(), false, timing);
    f.listener.set_connected(false);
    fs::write(dir.path().join("a.txt"), "a").unwrap();

    f.engine.poll_tick().await;

    assert_eq!(f.backend.calls(), vec!["up"]);
    // The successful send lengthened the interval; the poll itself did not.
    assert_eq!(f.engine.poll_interval(), fast_timing().poll_long);
}

#[tokio::test]
async fn idle_tick_retries_owed_changes() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    f.backend.mark_unsynced();

    f.engine.poll_tick().await;
    assert_eq!(f.backend.calls(), vec!["up"]);

    f.engine.poll_tick().await;
    assert_eq!(f.backend.calls(), vec!["up"]);
}

#[tokio::test]
async fn paused_poll_does_nothing() {
    let dir = TempDir::new().unwrap();
    let timing = Timing {
        poll_short: Duration::ZERO,
        ..fast_timing()
    };
    let f = fixture_with(dir.path(), true, timing);
    f.backend.push_remote(bob(), &[("theirs.txt", "remote")]);
    f.backend.mark_unsynced();

    f.engine.poll_tick().await;

    assert!(f.backend.calls().is_empty());
}

#[tokio::test]
async fn dispose_stops_the_engine() {
    let dir = TempDir::new().unwrap();
    let f = fixture(dir.path(), false);
    f.listener.subscribe_channel(f.engine.identifier().as_str());
    f.engine.arm();

    f.engine.dispose();

    assert!(f.engine.cancel_token().is_cancelled());
    assert!(!f.engine.gate().is_enabled());
    assert!(f.listener.subscribed.lock().unwrap().is_empty());

    f.backend.push_remote(bob(), &[("theirs.txt", "remote")]);
    f.engine
        .on_announcement(&Announcement::new("f".repeat(64), "r1"))
        .await;
    assert!(f.backend.calls().is_empty());
}
