//! Error types for the tailing writer library.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// The main error type for tailing writer operations.
///
/// Cloneable so that one recorded failure can be handed to every reader.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The output file could not be created or truncated.
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// Writing a chunk to the output file failed.
    #[error("Write failed: {0}")]
    Write(#[source] Arc<std::io::Error>),

    /// Flushing or closing the output file failed.
    #[error("Close failed: {0}")]
    Close(#[source] Arc<std::io::Error>),

    /// Reading evicted bytes back from the output file failed.
    #[error("Read failed: {0}")]
    Read(#[source] Arc<std::io::Error>),

    /// The producer aborted the stream.
    #[error("Aborted: {message}")]
    Aborted { message: String },

    /// An offset outside the in-memory window was requested.
    #[error("Offset {offset} is not in range ({start}, {end})")]
    OutOfRange { offset: u64, start: u64, end: u64 },

    /// The reader stopped waiting before a piece was delivered.
    #[error("Reader cancelled")]
    Cancelled,

    /// Data was appended after the stream was finished.
    #[error("Writer closed")]
    WriterClosed,

    /// Plain I/O errors outside the writer state machine.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<std::io::Error>),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(Arc::new(e))
    }
}

impl Error {
    /// Builds an explicit abort error with the given message.
    pub fn aborted(message: impl Into<String>) -> Self {
        Error::Aborted {
            message: message.into(),
        }
    }
}

/// A convenient Result type for tailing writer operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_io_error_conversion() {
        let io_error = IoError::new(ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();

        match error {
            Error::Io(_) => {}
            _ => panic!("Expected Error::Io variant"),
        }

        assert!(error.to_string().contains("I/O error"));
        assert!(error.to_string().contains("File not found"));
    }

    #[test]
    fn test_io_error_conversion_is_cloneable() {
        let error: Error = IoError::new(ErrorKind::PermissionDenied, "Access denied").into();
        let cloned = error.clone();

        match (&error, &cloned) {
            (Error::Io(a), Error::Io(b)) => {
                assert!(Arc::ptr_eq(a, b));
                assert_eq!(a.kind(), ErrorKind::PermissionDenied);
            }
            _ => panic!("Expected Error::Io variants"),
        }
        assert_eq!(error.source().unwrap().to_string(), "Access denied");
    }

    #[test]
    fn test_open_error_keeps_path_and_source() {
        let error = Error::Open {
            path: PathBuf::from("/tmp/out.bin"),
            source: Arc::new(IoError::new(ErrorKind::IsADirectory, "is a directory")),
        };

        assert_eq!(error.to_string(), "Failed to open /tmp/out.bin: is a directory");
        let source = error.source().expect("source should be set");
        assert_eq!(source.to_string(), "is a directory");
    }

    #[test]
    fn test_write_error_source_chain() {
        let error = Error::Write(Arc::new(IoError::new(ErrorKind::BrokenPipe, "pipe")));

        match &error {
            Error::Write(inner) => assert_eq!(inner.kind(), ErrorKind::BrokenPipe),
            _ => panic!("Expected Error::Write variant"),
        }
        assert!(error.source().is_some());
    }

    #[test]
    fn test_aborted_error() {
        let error = Error::aborted("ERROR");
        assert_eq!(error.to_string(), "Aborted: ERROR");
    }

    #[test]
    fn test_out_of_range_error() {
        let error = Error::OutOfRange {
            offset: 3,
            start: 10,
            end: 20,
        };
        assert_eq!(error.to_string(), "Offset 3 is not in range (10, 20)");
    }

    #[test]
    fn test_clone_shares_io_source() {
        let error = Error::Close(Arc::new(IoError::other("disk gone")));
        let cloned = error.clone();

        match (&error, &cloned) {
            (Error::Close(a), Error::Close(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("Expected Error::Close variants"),
        }
    }

    #[test]
    fn test_error_debug_format() {
        let error = Error::WriterClosed;
        let debug_str = format!("{:?}", error);
        assert_eq!(debug_str, "WriterClosed");
    }

    #[test]
    fn test_error_send_sync_traits() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
