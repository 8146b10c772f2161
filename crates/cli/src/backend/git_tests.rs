// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use drift_core::ChangeType;
use std::process::Command;
use tempfile::TempDir;
use yare::parameterized;

#[parameterized(
    added = { &["A  new.txt"], "+ ‘new.txt’" },
    edited = { &[" M x", "M  edited.txt"], "/ ‘edited.txt’" },
    deleted = { &["D  gone.txt"], "- ‘gone.txt’" },
    renamed = { &["R  old.txt -> new.txt"], "< ‘old.txt’\n> ‘new.txt’" },
    copied = { &["C  a.txt -> b.txt"], "+ ‘b.txt’" },
    quoted = { &["A  \"tab\\there.txt\""], "+ ‘tab\there.txt’" },
    nothing = { &[], "Changes" },
)]
fn commit_message_entries(status: &[&str], expected: &str) {
    assert_eq!(format_commit_message(status.iter().copied(), None), expected);
}

#[test]
fn commit_message_is_abbreviated_after_ten_entries() {
    let status: Vec<String> = (0..13).map(|i| format!("A  file{i}.txt")).collect();
    let message = format_commit_message(status.iter().map(String::as_str), None);
    let lines: Vec<_> = message.lines().collect();
    assert_eq!(lines.len(), 11);
    assert_eq!(lines[9], "+ ‘file9.txt’");
    assert_eq!(lines[10], "...and 3 more");
}

#[test]
fn commit_message_starts_with_first_line() {
    let message = format_commit_message(["M  a.txt"], Some("Back from holiday"));
    assert_eq!(message, "Back from holiday\n\n/ ‘a.txt’");
    assert_eq!(format_commit_message([], Some("Only this")), "Only this");
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "user.name=Seed", "-c", "user.email=seed@example.org"])
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// A bare remote seeded with one commit on `master`.
fn seeded_remote(root: &Path) -> PathBuf {
    let remote = root.join("remote.git");
    fs::create_dir_all(&remote).unwrap();
    git(&remote, &["init", "--quiet", "--bare"]);
    git(&remote, &["symbolic-ref", "HEAD", "refs/heads/master"]);

    let seed = root.join("seed");
    fs::create_dir_all(&seed).unwrap();
    git(&seed, &["init", "--quiet"]);
    git(&seed, &["symbolic-ref", "HEAD", "refs/heads/master"]);
    fs::write(seed.join("README.txt"), "hello\n").unwrap();
    git(&seed, &["add", "--all"]);
    git(&seed, &["commit", "--quiet", "-m", "seed"]);
    git(&seed, &["push", "--quiet", remote.to_str().unwrap(), "master"]);
    remote
}

fn ctx() -> SyncContext {
    SyncContext::new(CancellationToken::new())
}

fn clone(root: &Path, remote: &Path, name: &str) -> Git {
    let target = root.join(name);
    let fetch = GitFetch::new(PathBuf::from("git"));
    let address = remote.to_str().unwrap();
    fetch.fetch(address, &target, &ctx()).unwrap();

    let user = User::new(name, format!("{}@example.org", name.to_lowercase()));
    let setup = Bootstrap {
        user: &user,
        address,
        storage: StorageType::Plain,
        salt: None,
        password: None,
    };
    fetch.bootstrap(&target, &setup).unwrap();
    Git::new(
        BackendOptions::new(&target, address, user),
        PathBuf::from("git"),
    )
}

#[test]
fn sync_up_then_sync_down_transfers_files() {
    let root = TempDir::new().unwrap();
    let remote = seeded_remote(root.path());
    let alice = clone(root.path(), &remote, "Alice");
    let bob = clone(root.path(), &remote, "Bob");

    fs::write(alice.path().join("notes.txt"), "from alice\n").unwrap();
    assert!(alice.has_local_changes());
    alice.sync_up(&ctx()).unwrap();
    assert!(!alice.has_local_changes());

    assert!(bob.has_remote_changes(&ctx()));
    bob.sync_down(&ctx()).unwrap();
    assert_eq!(
        fs::read_to_string(bob.path().join("notes.txt")).unwrap(),
        "from alice\n"
    );
    assert_eq!(bob.current_revision(), alice.current_revision());
    assert!(!bob.has_remote_changes(&ctx()));

    let sets = bob.change_sets(None, 10).unwrap();
    assert_eq!(sets[0].user.name, "Alice");
    assert_eq!(sets[0].changes[0].path, "notes.txt");
    assert_eq!(sets[0].changes[0].change_type, ChangeType::Added);
    assert_eq!(sets.last().unwrap().user.name, "Seed");
}

#[test]
fn sync_down_without_remote_changes_keeps_revision() {
    let root = TempDir::new().unwrap();
    let remote = seeded_remote(root.path());
    let alice = clone(root.path(), &remote, "Alice");

    let before = alice.current_revision();
    alice.sync_down(&ctx()).unwrap();
    assert_eq!(alice.current_revision(), before);
    assert!(!alice.has_unsynced_changes());
}

#[test]
fn edits_merged_during_sync_down_are_left_to_send() {
    let root = TempDir::new().unwrap();
    let remote = seeded_remote(root.path());
    let alice = clone(root.path(), &remote, "Alice");
    let bob = clone(root.path(), &remote, "Bob");

    fs::write(bob.path().join("bob.txt"), "bob\n").unwrap();
    bob.sync_up(&ctx()).unwrap();
    fs::write(alice.path().join("offline.txt"), "written offline\n").unwrap();

    alice.sync_down(&ctx()).unwrap();
    assert!(!alice.has_local_changes());
    assert!(alice.has_unsynced_changes());

    alice.sync_up(&ctx()).unwrap();
    assert!(!alice.has_remote_changes(&ctx()));
    bob.sync_down(&ctx()).unwrap();
    assert!(!bob.has_unsynced_changes());
    assert_eq!(
        fs::read_to_string(bob.path().join("offline.txt")).unwrap(),
        "written offline\n"
    );
}

#[tokio::test]
async fn initialize_sends_edits_made_while_offline() {
    use crate::repository::test_helpers::{fast_timing, settings, FakeListener, RecordingStore};
    use crate::repository::{Engine, FolderStore};
    use drift_core::SyncStatus;
    use std::sync::Arc;

    let root = TempDir::new().unwrap();
    let remote = seeded_remote(root.path());
    let alice = clone(root.path(), &remote, "Alice");
    let bob = clone(root.path(), &remote, "Bob");
    let alice_path = alice.path().to_path_buf();
    let alice = Arc::new(alice);
    let store: Arc<dyn FolderStore> = Arc::new(RecordingStore::default());

    for round in ["first", "second"] {
        bob.sync_down(&ctx()).unwrap();
        fs::write(bob.path().join(format!("bob-{round}.txt")), round).unwrap();
        bob.sync_up(&ctx()).unwrap();
        fs::write(alice_path.join(format!("offline-{round}.txt")), round).unwrap();

        let engine = Engine::new(
            settings(false, fast_timing()),
            alice.clone(),
            FakeListener::new(true),
            store.clone(),
            CancellationToken::new(),
        );
        engine.initialize().await;

        assert_eq!(engine.status(), SyncStatus::Idle);
        assert!(!alice.has_unsynced_changes());
        assert!(!alice.has_remote_changes(&ctx()));
        let files = git(&remote, &["ls-tree", "--name-only", "master"]);
        assert!(
            files.lines().any(|f| f == format!("offline-{round}.txt")),
            "{round} offline edit missing from remote: {files}"
        );
    }
}

#[test]
fn commit_message_uses_context_first_line() {
    let root = TempDir::new().unwrap();
    let remote = seeded_remote(root.path());
    let alice = clone(root.path(), &remote, "Alice");

    fs::write(alice.path().join("a.txt"), "a").unwrap();
    let ctx = ctx().with_message(Some("Resumed".into()));
    alice.sync_up(&ctx).unwrap();

    let message = git(alice.path(), &["log", "-1", "--format=%B"]);
    assert!(message.starts_with("Resumed\n\n+ ‘a.txt’"));
}

#[test]
fn concurrent_edits_keep_both_versions() {
    let root = TempDir::new().unwrap();
    let remote = seeded_remote(root.path());
    let alice = clone(root.path(), &remote, "Alice");
    let bob = clone(root.path(), &remote, "Bob");

    fs::write(alice.path().join("README.txt"), "alice wins?\n").unwrap();
    alice.sync_up(&ctx()).unwrap();

    fs::write(bob.path().join("README.txt"), "bob wins?\n").unwrap();
    // Push is rejected, the merge resolves the conflict, the retry succeeds.
    assert!(bob.sync_up(&ctx()).is_err());
    bob.sync_down(&ctx()).unwrap();
    assert!(bob.has_unsynced_changes());
    bob.sync_up(&ctx()).unwrap();

    assert_eq!(
        fs::read_to_string(bob.path().join("README.txt")).unwrap(),
        "alice wins?\n"
    );
    let copies: Vec<_> = fs::read_dir(bob.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("README (Bob, "))
        .collect();
    assert_eq!(copies.len(), 1);
    assert_eq!(
        fs::read_to_string(bob.path().join(&copies[0])).unwrap(),
        "bob wins?\n"
    );

    alice.sync_down(&ctx()).unwrap();
    assert!(alice.path().join(&copies[0]).exists());
}

#[test]
fn restore_file_leaves_head_untouched() {
    let root = TempDir::new().unwrap();
    let remote = seeded_remote(root.path());
    let alice = clone(root.path(), &remote, "Alice");
    let first = alice.current_revision().unwrap();

    fs::write(alice.path().join("README.txt"), "changed\n").unwrap();
    alice.sync_up(&ctx()).unwrap();
    let head = alice.current_revision();

    let target = root.path().join("restored/README.txt");
    alice.restore_file("README.txt", &first, &target, &ctx()).unwrap();

    assert_eq!(fs::read(&target).unwrap(), b"hello\n");
    assert_eq!(alice.current_revision(), head);
    assert_eq!(
        fs::read_to_string(alice.path().join("README.txt")).unwrap(),
        "changed\n"
    );
}

#[test]
fn restore_of_unknown_path_fails_and_leaves_no_file() {
    let root = TempDir::new().unwrap();
    let remote = seeded_remote(root.path());
    let alice = clone(root.path(), &remote, "Alice");
    let head = alice.current_revision().unwrap();

    let target = root.path().join("missing.txt");
    let err = alice
        .restore_file("nope.txt", &head, &target, &ctx())
        .unwrap_err();
    assert_eq!(err.status, drift_core::ErrorStatus::NotFound);
    assert!(!target.exists());
}

#[test]
fn empty_folders_are_reported_as_folder_changes() {
    let root = TempDir::new().unwrap();
    let remote = seeded_remote(root.path());
    let alice = clone(root.path(), &remote, "Alice");

    fs::create_dir_all(alice.path().join("photos")).unwrap();
    alice.sync_up(&ctx()).unwrap();

    assert!(alice.path().join("photos/.empty").exists());
    let sets = alice.change_sets(None, 1).unwrap();
    assert_eq!(sets[0].changes[0].path, "photos");
    assert!(sets[0].changes[0].is_folder);
}

#[test]
fn per_path_history_is_filtered() {
    let root = TempDir::new().unwrap();
    let remote = seeded_remote(root.path());
    let alice = clone(root.path(), &remote, "Alice");

    fs::write(alice.path().join("a.txt"), "a").unwrap();
    alice.sync_up(&ctx()).unwrap();
    fs::write(alice.path().join("b.txt"), "b").unwrap();
    alice.sync_up(&ctx()).unwrap();

    let sets = alice.change_sets(Some("a.txt"), 10).unwrap();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].changes[0].path, "a.txt");
}

#[test]
fn unsynced_flag_lives_in_git_dir() {
    let root = TempDir::new().unwrap();
    let remote = seeded_remote(root.path());
    let alice = clone(root.path(), &remote, "Alice");

    assert!(!alice.has_unsynced_changes());
    alice.set_unsynced_changes(true).unwrap();
    assert!(alice.path().join(".git/has_unsynced_changes").exists());
    assert!(alice.has_unsynced_changes());
    alice.set_unsynced_changes(false).unwrap();
    assert!(!alice.has_unsynced_changes());
}

#[test]
fn unreachable_remote_is_classified() {
    let root = TempDir::new().unwrap();
    let remote = seeded_remote(root.path());
    let alice = clone(root.path(), &remote, "Alice");
    git(
        alice.path(),
        &["remote", "set-url", "origin", root.path().join("moved.git").to_str().unwrap()],
    );

    fs::write(alice.path().join("a.txt"), "a").unwrap();
    let err = alice.sync_up(&ctx()).unwrap_err();
    assert_eq!(err.status, drift_core::ErrorStatus::NotFound);
}

#[test]
fn storage_offers_follow_marker_branches() {
    let root = TempDir::new().unwrap();
    let remote = seeded_remote(root.path());
    let fetch = GitFetch::new(PathBuf::from("git"));
    let address = remote.to_str().unwrap().to_string();

    assert_eq!(fetch.storage_offers(&address, &ctx()), vec![StorageOffer::plain()]);

    git(&remote, &["branch", "x-drift-encrypted-0011aabbccddeeff", "master"]);
    let offers = fetch.storage_offers(&address, &ctx());
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].storage_type, StorageType::Encrypted);
    assert_eq!(offers[0].salt.as_deref(), Some("0011aabbccddeeff"));
}

#[test]
fn bootstrap_writes_ignore_rules_and_identity() {
    let root = TempDir::new().unwrap();
    let remote = seeded_remote(root.path());
    let alice = clone(root.path(), &remote, "Alice");

    let exclude = fs::read_to_string(alice.path().join(".git/info/exclude")).unwrap();
    assert!(exclude.contains(".DS_Store"));
    assert_eq!(git(alice.path(), &["config", "user.name"]).trim(), "Alice");
}

#[test]
fn encrypted_bootstrap_requires_password() {
    let root = TempDir::new().unwrap();
    let remote = seeded_remote(root.path());
    let target = root.path().join("enc");
    let fetch = GitFetch::new(PathBuf::from("git"));
    fetch.fetch(remote.to_str().unwrap(), &target, &ctx()).unwrap();

    let user = User::new("Alice", "alice@example.org");
    let setup = Bootstrap {
        user: &user,
        address: "x",
        storage: StorageType::Encrypted,
        salt: Some("0011aabbccddeeff"),
        password: None,
    };
    assert!(fetch.bootstrap(&target, &setup).is_err());
}

#[test]
fn sizes_are_cached_after_sync() {
    let root = TempDir::new().unwrap();
    let remote = seeded_remote(root.path());
    let alice = clone(root.path(), &remote, "Alice");

    fs::write(alice.path().join("data.bin"), vec![0u8; 1000]).unwrap();
    alice.sync_up(&ctx()).unwrap();
    assert!(alice.path().join(".git/info/size").exists());
    assert!(alice.size() >= 1000);
    assert!(alice.history_size() > 0);
}
