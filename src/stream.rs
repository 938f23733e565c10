//! Stream implementation for tailing the output of a [`TailingWriter`](crate::TailingWriter).

use crate::error::Result;
use crate::reader::{Piece, ReaderCursor};
use bytes::{Bytes, BytesMut};
use futures::Stream;
use futures::stream::{self, BoxStream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

/// A stream of every byte written, from offset zero to the end of the stream.
///
/// Yields `Err` once and then ends if the writer fails. Dropping the stream
/// detaches the reader.
pub struct TailReader {
    inner: BoxStream<'static, Result<Bytes>>,
}

enum ReadState {
    Pulling(ReaderCursor),
    Draining(ReaderCursor, BoxStream<'static, Result<Bytes>>),
    Done,
}

impl TailReader {
    pub(crate) fn new(cursor: ReaderCursor) -> Self {
        let inner = stream::unfold(ReadState::Pulling(cursor), next_chunk).boxed();
        Self { inner }
    }

    /// Collects the rest of the stream into one buffer.
    pub async fn read_to_end(mut self) -> Result<Bytes> {
        let mut out = BytesMut::new();
        while let Some(chunk) = self.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out.freeze())
    }
}

/// Produces one chunk, pulling from the cursor only when the consumer asks.
async fn next_chunk(mut state: ReadState) -> Option<(Result<Bytes>, ReadState)> {
    loop {
        state = match state {
            ReadState::Done => return None,
            ReadState::Draining(cursor, mut disk) => match disk.next().await {
                Some(Ok(chunk)) => return Some((Ok(chunk), ReadState::Draining(cursor, disk))),
                Some(Err(e)) => return Some((Err(e), ReadState::Done)),
                None => ReadState::Pulling(cursor),
            },
            ReadState::Pulling(mut cursor) => match cursor.pull().await {
                Ok(Piece::Memory(chunk)) => return Some((Ok(chunk), ReadState::Pulling(cursor))),
                Ok(Piece::Disk(range)) => ReadState::Draining(cursor, range.into_stream()),
                Ok(Piece::End) => return None,
                Err(e) => return Some((Err(e), ReadState::Done)),
            },
        };
    }
}

impl Stream for TailReader {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}
