//! Integration test for [`companion_core::init_tracing`].
//!
//! Kept as the only test in this binary: the subscriber is process-global.

use companion_core::init_tracing;
use tempfile::TempDir;

/// **Test: Tracing writes to the log file and refuses a second global install.**
///
/// **Setup:** Temp dir; log path in a not-yet-existing subdirectory.
/// **Action:** `init_tracing(Some(path))`, emit one event, call `init_tracing(None)`.
/// **Expected:** First call succeeds and creates the file with the event; second call errors.
#[test]
fn test_init_tracing_writes_file_once() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let log_path = dir.path().join("logs").join("companion.log");

    init_tracing(Some(log_path.as_path())).expect("Failed to init tracing");
    tracing::warn!(target: "companion_core", "tracing initialized");

    let contents = std::fs::read_to_string(&log_path).expect("Failed to read log file");
    assert!(contents.contains("tracing initialized"));

    assert!(init_tracing(None).is_err());
}
