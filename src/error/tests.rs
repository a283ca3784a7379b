//! Tests for error types.

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::path::Path;

    #[test]
    fn test_error_display() {
        let err = Error::config("root must be a directory");
        assert_eq!(
            err.to_string(),
            "configuration error: root must be a directory"
        );
    }

    #[test]
    fn test_walk_error_conversion() {
        let walk_err = WalkError::DuplicatePath {
            path: "/root/a.txt".to_string(),
        };
        let err: Error = walk_err.into();
        assert!(matches!(err, Error::Walk(_)));
    }

    #[test]
    fn test_watcher_error_conversion() {
        let watch_err = WatcherError::WatchFailed {
            path: "/tmp/test".to_string(),
            reason: "permission denied".to_string(),
        };
        let err: Error = watch_err.into();
        assert!(matches!(err, Error::Watcher(_)));
    }

    #[test]
    fn test_handler_error_conversion() {
        let handler_err = HandlerError::WatcherNotAttached {
            path: "/root/a.txt".to_string(),
        };
        let err: Error = handler_err.into();
        assert!(matches!(err, Error::Handler(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_internal() {
        let err = Error::internal("test internal error");
        assert_eq!(err.to_string(), "internal error: test internal error");
    }

    #[test]
    fn test_walk_error_traversal() {
        let err = WalkError::traversal(Path::new("/gone"), "No such file or directory");
        assert_eq!(
            err.to_string(),
            "failed to walk '/gone': No such file or directory"
        );
    }

    #[test]
    fn test_walk_error_duplicate_path() {
        let err = WalkError::DuplicatePath {
            path: "/root/a.txt".to_string(),
        };
        assert_eq!(err.to_string(), "duplicate path '/root/a.txt' in walk output");
    }

    #[test]
    fn test_walk_error_gitignore() {
        let err = WalkError::GitIgnore {
            path: "/root/.gitignore".to_string(),
            reason: "unreadable".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to compile gitignore '/root/.gitignore': unreadable"
        );
    }

    #[test]
    fn test_watcher_error_already_stopped() {
        assert_eq!(
            WatcherError::AlreadyStopped.to_string(),
            "watcher already stopped"
        );
    }

    #[test]
    fn test_handler_error_not_attached() {
        let err = HandlerError::WatcherNotAttached {
            path: "/root/a.txt".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "watcher not attached, cannot handle event for '/root/a.txt'"
        );
    }

    #[test]
    fn test_nested_error_display() {
        let err: Error = WalkError::traversal(Path::new("/x"), "boom").into();
        assert_eq!(err.to_string(), "walk error: failed to walk '/x': boom");
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
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "configuration error: inner error"
        );
    }

    #[test]
    fn test_error_debug_format() {
        let err = Error::Internal("something went wrong".to_string());
        let debug_str = format!("{err:?}");
        assert!(debug_str.contains("Internal"));
        assert!(debug_str.contains("something went wrong"));
    }
}
