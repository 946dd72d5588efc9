//! Shared helpers for configuration integration tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use companion_core::config::ReloadOutcome;
use tokio::sync::mpsc;

/// Debounce used by reload tests; short to keep the suite fast.
#[allow(dead_code)]
pub const TEST_DEBOUNCE: Duration = Duration::from_millis(100);

/// Write `content` to `dir/name`, creating `dir` if needed.
pub fn write(dir: &Path, name: &str, content: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), content).unwrap();
}

/// Build a program-argument map from pairs.
#[allow(dead_code)]
pub fn args(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[allow(dead_code)]
pub fn profiles(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Wait for the next reload outcome, or `None` after `timeout`.
#[allow(dead_code)]
pub async fn next_reload(rx: &mut mpsc::UnboundedReceiver<ReloadOutcome>, timeout: Duration) -> Option<ReloadOutcome> {
    tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
}
