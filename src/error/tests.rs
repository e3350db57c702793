//! Tests for error types.

use super::*;

#[test]
fn test_error_display() {
    let err = Error::config("invalid debounce");
    assert_eq!(err.to_string(), "configuration error: invalid debounce");
}

#[test]
fn test_scan_error_display() {
    let err = ScanError::TooLarge {
        size: 2048,
        limit: 1024,
    };
    assert_eq!(err.to_string(), "file too large: 2048 bytes (limit 1024)");

    let err = ScanError::Decode { valid_up_to: 7 };
    assert_eq!(err.to_string(), "invalid UTF-8 at byte 7");
}

#[test]
fn test_storage_error_conversion() {
    let storage_err = StorageError::Database("connection failed".to_string());
    let err: Error = storage_err.into();
    assert!(matches!(err, Error::Storage(_)));
}

#[test]
fn test_scan_error_conversion() {
    let err: Error = ScanError::Binary.into();
    assert!(matches!(err, Error::Scan(ScanError::Binary)));
    assert_eq!(err.to_string(), "scan error: binary content");
}

#[test]
fn test_watcher_error_conversion() {
    let watch_err = WatcherError::WatchFailed {
        path: "/tmp/test".to_string(),
        reason: "permission denied".to_string(),
    };
    let err: Error = watch_err.into();
    assert!(matches!(err, Error::Watcher(_)));
    assert!(err.to_string().contains("/tmp/test"));
}

#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: Error = io_err.into();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_json_error_conversion() {
    let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
    let err: Error = json_err.into();
    assert!(matches!(err, Error::Json(_)));
}

#[test]
fn test_error_debug_format() {
    let err = Error::internal("something went wrong");
    let debug_str = format!("{err:?}");
    assert!(debug_str.contains("Internal"));
    assert!(debug_str.contains("something went wrong"));
}

#[test]
fn test_error_propagation_with_question_mark() {
    fn inner() -> Result<i32> {
        Err(Error::config("inner error"))
    }

    fn outer() -> Result<i32> {
        let _ = inner()?;
        Ok(0)
    }

    let result = outer();
    assert_eq!(
        result.unwrap_err().to_string(),
        "configuration error: inner error"
    );
}
