use std::{fs, thread::sleep, time::Duration};

use serial_test::serial;
use tempfile::tempdir;

// The global subscriber can only be installed once per test binary, so the
// file case and the repeated call share one test.
#[test]
#[serial]
fn writes_log_file_and_ignores_second_init() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.txt");

    segment_canvas::logging::init(true, Some(path.clone()));
    segment_canvas::logging::init(false, None);
    tracing::info!("room test line");

    sleep(Duration::from_millis(100));

    assert!(path.exists(), "log file was not created");
    let contents = fs::read_to_string(path).unwrap();
    assert!(contents.contains("room test line"));
}
