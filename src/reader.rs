//! Reader cursors and reads of already-persisted ranges of the file.

use crate::error::{Error, Result};
use crate::options::ReadOptions;
use crate::stream::TailReader;
use crate::writer::{Core, Delivery, ReaderId};
use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use futures::stream::{self, BoxStream, StreamExt};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::oneshot;

/// The next piece of the stream handed to a reader.
#[derive(Debug)]
pub enum Piece {
    /// Bytes served straight from the in-memory window.
    Memory(Bytes),
    /// A range that was evicted from memory and must be read from the file.
    Disk(DiskRange),
    /// The stream finished and the reader has seen every byte.
    End,
}

/// A reader's position in the stream.
///
/// Pieces are only produced on [`pull`](ReaderCursor::pull); a cursor that is
/// not pulled is never handed data. Dropping the cursor detaches it without
/// affecting the writer or other readers.
#[derive(Debug)]
pub struct ReaderCursor {
    core: Arc<Core>,
    id: ReaderId,
    options: ReadOptions,
    /// An outstanding request, kept across dropped `pull` futures.
    pending: Option<oneshot::Receiver<Delivery>>,
}

impl ReaderCursor {
    pub(crate) fn attach(core: Arc<Core>, options: ReadOptions) -> Self {
        let id = core.attach();
        Self {
            core,
            id,
            options,
            pending: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Requests the next piece, waiting until one can be served.
    ///
    /// Returns the stream's error once it has failed.
    ///
    /// Cancel safe: if the returned future is dropped before it completes,
    /// the next call picks up the same request and no piece is lost.
    pub async fn pull(&mut self) -> Result<Piece> {
        let rx = self
            .pending
            .get_or_insert_with(|| self.core.pull(self.id));
        let received = rx.await;
        self.pending = None;

        match received.map_err(|_| Error::Cancelled)? {
            Delivery::Chunk(chunk) => Ok(Piece::Memory(chunk)),
            Delivery::Disk { start, end } => Ok(Piece::Disk(DiskRange::new(
                self.core.path(),
                start,
                end,
                self.options.high_water_mark,
            ))),
            Delivery::End => Ok(Piece::End),
            Delivery::Failed(error) => Err(error),
        }
    }

    /// Abandons the reader, detaching it from the writer.
    pub fn cancel(self) {
        drop(self);
    }

    pub fn into_stream(self) -> TailReader {
        TailReader::new(self)
    }
}

impl Drop for ReaderCursor {
    fn drop(&mut self) {
        self.core.detach(self.id);
    }
}

/// A half-open byte range `[start, end)` of the output file.
#[derive(Debug, Clone)]
pub struct DiskRange {
    path: PathBuf,
    start: u64,
    end: u64,
    chunk_size: usize,
}

impl DiskRange {
    pub(crate) fn new(path: &Path, start: u64, end: u64, chunk_size: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            start,
            end,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Reads the range in chunks of at most the configured size.
    pub fn into_stream(self) -> BoxStream<'static, Result<Bytes>> {
        stream::try_unfold((self, None), |(range, file)| read_next(range, file)).boxed()
    }

    /// Reads the whole range into one buffer.
    pub async fn read_all(self) -> Result<Bytes> {
        let mut out = BytesMut::with_capacity(self.len() as usize);
        let mut chunks = self.into_stream();
        while let Some(chunk) = chunks.try_next().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out.freeze())
    }
}

async fn read_next(
    mut range: DiskRange,
    file: Option<File>,
) -> Result<Option<(Bytes, (DiskRange, Option<File>))>> {
    if range.is_empty() {
        return Ok(None);
    }

    let mut file = match file {
        Some(file) => file,
        None => open_at(&range.path, range.start).await.map_err(read_error)?,
    };

    let len = range.len().min(range.chunk_size as u64) as usize;
    let mut buf = BytesMut::zeroed(len);
    file.read_exact(&mut buf).await.map_err(read_error)?;
    range.start += len as u64;

    Ok(Some((buf.freeze(), (range, Some(file)))))
}

async fn open_at(path: &Path, offset: u64) -> std::io::Result<File> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    Ok(file)
}

fn read_error(e: std::io::Error) -> Error {
    Error::Read(Arc::new(e))
}
