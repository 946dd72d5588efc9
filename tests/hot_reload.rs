//! Hot reload and teardown tests.

use std::collections::BTreeMap;
use std::time::Duration;

use companion_core::config::{ConfigError, ConfigManager, ConfigResolver};

mod common;

const EXPECT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(500);

fn manager() -> (ConfigManager, tokio::sync::mpsc::UnboundedReceiver<companion_core::config::ReloadOutcome>) {
    let (manager, rx) = ConfigManager::with_channel();
    (manager.with_debounce(common::TEST_DEBOUNCE), rx)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_effective_change_reloads_once() {
    let dir = tempfile::tempdir().unwrap();
    common::write(dir.path(), "config.toml", "[server]\nport = 5000\n");

    let (manager, mut rx) = manager();
    let initial = manager.initiate(dir.path(), &[], &BTreeMap::new()).unwrap();
    assert_eq!(initial.snapshot.server.port, 5000);

    common::write(dir.path(), "config.toml", "[server]\nport = 5001\n");

    let reloaded = common::next_reload(&mut rx, EXPECT).await.expect("no reload").unwrap();
    assert_eq!(reloaded.server.port, 5001);

    let fresh = ConfigResolver::new(dir.path(), &BTreeMap::new())
        .unwrap()
        .initial_read(&[])
        .unwrap();
    assert_eq!(*reloaded, *fresh.result.snapshot);
    assert_eq!(manager.current().unwrap().server.port, 5001);

    assert!(common::next_reload(&mut rx, QUIET).await.is_none());
    manager.teardown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_burst_of_writes_is_coalesced() {
    let dir = tempfile::tempdir().unwrap();
    common::write(dir.path(), "config.toml", "[server]\nport = 5000\n");

    let (manager, mut rx) = manager();
    manager.initiate(dir.path(), &[], &BTreeMap::new()).unwrap();

    for port in [5001, 5002, 5003] {
        common::write(dir.path(), "config.toml", &format!("[server]\nport = {}\n", port));
    }

    let reloaded = common::next_reload(&mut rx, EXPECT).await.expect("no reload").unwrap();
    assert_eq!(reloaded.server.port, 5003);
    assert!(common::next_reload(&mut rx, QUIET).await.is_none());
    manager.teardown();
}

#[tokio::test(flavor = "current_thread")]
async fn test_reload_on_single_threaded_runtime() {
    let dir = tempfile::tempdir().unwrap();
    common::write(dir.path(), "config.toml", "[server]\nport = 5000\n");

    let (manager, mut rx) = manager();
    manager.initiate(dir.path(), &[], &BTreeMap::new()).unwrap();

    let ticks = tokio::spawn(async {
        let mut count = 0u32;
        for _ in 0..10 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            count += 1;
        }
        count
    });
    common::write(dir.path(), "config.toml", "[server]\nport = 5001\n");

    let reloaded = common::next_reload(&mut rx, EXPECT).await.expect("no reload").unwrap();
    assert_eq!(reloaded.server.port, 5001);
    assert_eq!(ticks.await.unwrap(), 10);
    manager.teardown();
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn test_watch_failure_leaves_no_snapshot() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    common::write(dir.path(), "config.toml", "[server]\nport = 5000\n");
    // files stay readable, but the directory itself cannot be watched
    std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o300)).unwrap();
    if std::fs::read_dir(dir.path()).is_ok() {
        // permissions are not enforced for this user
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o700)).unwrap();
        return;
    }

    let (manager, _rx) = manager();
    let result = manager.initiate(dir.path(), &[], &BTreeMap::new());
    std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o700)).unwrap();

    assert!(matches!(result, Err(ConfigError::Watch(_))));
    assert!(manager.current().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_profile_change_reloads() {
    let dir = tempfile::tempdir().unwrap();
    common::write(dir.path(), "config.toml", "");
    common::write(dir.path(), "config.dev.toml", "[chunk]\nflash = false\n");

    let (manager, mut rx) = manager();
    let initial = manager
        .initiate(dir.path(), &common::profiles(&["dev"]), &BTreeMap::new())
        .unwrap();
    assert!(!initial.snapshot.chunk.flash);

    common::write(dir.path(), "config.dev.toml", "[chunk]\nflash = true\n");

    let reloaded = common::next_reload(&mut rx, EXPECT).await.expect("no reload").unwrap();
    assert!(reloaded.chunk.flash);
    manager.teardown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_program_arguments_survive_reload() {
    let dir = tempfile::tempdir().unwrap();
    common::write(dir.path(), "config.toml", "[server]\nport = 5000\n");

    let (manager, mut rx) = manager();
    let args = common::args(&[("server.port", "7000")]);
    let initial = manager.initiate(dir.path(), &[], &args).unwrap();
    assert_eq!(initial.snapshot.server.port, 7000);

    common::write(dir.path(), "config.toml", "launchBrowser = false\n[server]\nport = 5001\n");

    let reloaded = common::next_reload(&mut rx, EXPECT).await.expect("no reload").unwrap();
    assert_eq!(reloaded.server.port, 7000);
    assert!(!reloaded.launch_browser);
    manager.teardown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_comment_only_edit_is_silent() {
    let dir = tempfile::tempdir().unwrap();
    common::write(dir.path(), "config.toml", "[server]\nport = 5000\n");

    let (manager, mut rx) = manager();
    let initial = manager.initiate(dir.path(), &[], &BTreeMap::new()).unwrap();

    common::write(dir.path(), "config.toml", "# just a note\n[server]\nport = 5000\n");

    assert!(common::next_reload(&mut rx, QUIET).await.is_none());
    assert!(std::sync::Arc::ptr_eq(&manager.current().unwrap(), &initial.snapshot));
    manager.teardown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_edit_keeps_previous_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    common::write(dir.path(), "config.toml", "[server]\nport = 5000\n");

    let (manager, mut rx) = manager();
    manager.initiate(dir.path(), &[], &BTreeMap::new()).unwrap();

    common::write(dir.path(), "config.toml", "[server\nport = ");

    let outcome = common::next_reload(&mut rx, EXPECT).await.expect("no reload");
    assert!(matches!(outcome, Err(ConfigError::Parse { .. })));
    assert_eq!(manager.current().unwrap().server.port, 5000);

    // a later valid edit recovers
    common::write(dir.path(), "config.toml", "[server]\nport = 5002\n");
    let reloaded = common::next_reload(&mut rx, EXPECT).await.expect("no reload").unwrap();
    assert_eq!(reloaded.server.port, 5002);
    manager.teardown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_validation_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    common::write(dir.path(), "config.toml", "");

    let (manager, mut rx) = manager();
    manager.initiate(dir.path(), &[], &BTreeMap::new()).unwrap();

    common::write(dir.path(), "config.toml", "[ocr.ocrspace]\nengine = 2\n");

    match common::next_reload(&mut rx, EXPECT).await.expect("no reload") {
        Err(ConfigError::Validation(e)) => assert_eq!(e.key, "ocr.ocrspace.engine"),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(manager.current().unwrap().ocr.ocrspace.engine, 1);
    manager.teardown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_no_callbacks_after_teardown() {
    let dir = tempfile::tempdir().unwrap();
    common::write(dir.path(), "config.toml", "[server]\nport = 5000\n");

    let (manager, mut rx) = manager();
    manager.initiate(dir.path(), &[], &BTreeMap::new()).unwrap();
    manager.teardown();

    common::write(dir.path(), "config.toml", "[server]\nport = 6000\n");

    assert!(common::next_reload(&mut rx, QUIET).await.is_none());
    assert_eq!(manager.current().unwrap().server.port, 5000);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_teardown_is_idempotent() {
    let (manager, _rx) = manager();
    manager.teardown();

    let dir = tempfile::tempdir().unwrap();
    common::write(dir.path(), "config.toml", "");
    manager.initiate(dir.path(), &[], &BTreeMap::new()).unwrap();

    manager.teardown();
    manager.teardown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reinitiate_replaces_session() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    common::write(first.path(), "config.toml", "[server]\nport = 5000\n");
    common::write(second.path(), "config.toml", "[server]\nport = 6000\n");

    let (manager, mut rx) = manager();
    manager.initiate(first.path(), &[], &BTreeMap::new()).unwrap();
    manager.initiate(second.path(), &[], &BTreeMap::new()).unwrap();
    assert_eq!(manager.current().unwrap().server.port, 6000);

    // the first directory is no longer watched
    common::write(first.path(), "config.toml", "[server]\nport = 5001\n");
    assert!(common::next_reload(&mut rx, QUIET).await.is_none());
    manager.teardown();
}

#[test]
fn test_initiate_outside_runtime_fails() {
    let dir = tempfile::tempdir().unwrap();
    common::write(dir.path(), "config.toml", "");

    let (manager, _rx) = ConfigManager::with_channel();
    let result = manager.initiate(dir.path(), &[], &BTreeMap::new());
    assert!(matches!(result, Err(ConfigError::NoRuntime)));
    assert!(manager.current().is_none());
}
