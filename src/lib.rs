//! A write-once, read-many byte stream backed by a file.
//!
//! One producer appends chunks to a file through a [`TailingWriter`]. Any
//! number of readers can attach at any time (before writing starts, while it
//! is in progress, or after it has finished) and each receives every byte
//! from the start of the stream, in order. Recent bytes are served from a
//! bounded in-memory window; readers that fall behind it catch up from the
//! file.
//!
//! # Example
//!
//! ```rust,no_run
//! use tailing_writer::{TailingWriter, WriterOptions};
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let writer = TailingWriter::create("download.bin", WriterOptions::default());
//!     let mut reader = writer.reader();
//!
//!     writer.append("hello ")?;
//!     writer.append("world")?;
//!     writer.end();
//!
//!     while let Some(chunk) = reader.next().await {
//!         println!("{} bytes", chunk?.len());
//!     }
//!
//!     Ok(())
//! }
//! ```

// Internal modules - not part of public API
mod error;
mod options;
mod persist;
mod reader;
mod sink;
mod stream;
mod window;
mod writer;

#[cfg(test)]
mod test_helpers;

// Public API exports
pub use error::{Error, Result};
pub use options::{DEFAULT_BUFFER_SIZE, DEFAULT_HIGH_WATER_MARK, ReadOptions, WriterOptions};
pub use reader::{DiskRange, Piece, ReaderCursor};
pub use stream::TailReader;
pub use writer::{StreamState, TailingWriter, WriterEvent};

use std::path::Path;

/// Creates a writer for `path` with default options.
///
/// # Example
///
/// ```rust,no_run
/// use tailing_writer::create;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let writer = create("out.bin");
///     writer.append("data")?;
///     writer.finish().await?;
///
///     let data = writer.reader().read_to_end().await?;
///     assert_eq!(data, "data");
///     Ok(())
/// }
/// ```
pub fn create<P: AsRef<Path>>(path: P) -> TailingWriter {
    TailingWriter::create(path, WriterOptions::default())
}
