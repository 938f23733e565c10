//! `Sink` implementation so a [`TailingWriter`] can sit at the end of a pipeline.

use crate::error::{Error, Result};
use crate::writer::TailingWriter;
use bytes::Bytes;
use futures::{FutureExt, Sink};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

impl Sink<Bytes> for TailingWriter {
    type Error = Error;

    /// Always ready: the producer is never held back by readers.
    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: Bytes) -> Result<()> {
        self.append(item)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        let this = &mut *self;
        let core = &this.core;
        let flushing = this.flushing.get_or_insert_with(|| {
            let target = core.snapshot().accepted;
            core.wait_persisted(target).boxed()
        });

        let result = ready!(flushing.poll_unpin(cx));
        this.flushing = None;
        Poll::Ready(result)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        let this = &mut *self;
        let core = &this.core;
        let closing = this.closing.get_or_insert_with(|| {
            core.request_finish();
            core.wait_terminal().boxed()
        });

        let result = ready!(closing.poll_unpin(cx));
        this.closing = None;
        Poll::Ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::WriterOptions;
    use crate::test_helpers::TempOutput;
    use crate::writer::StreamState;
    use futures::{SinkExt, stream};

    #[tokio::test]
    async fn test_send_all_and_close() {
        let output = TempOutput::new().unwrap();
        let mut writer = TailingWriter::create(output.path(), WriterOptions::default());
        let reader = writer.reader();

        let mut source = stream::iter(
            ["abc", "def", "ghi"].map(|s| Ok::<_, Error>(Bytes::from_static(s.as_bytes()))),
        );
        writer.send_all(&mut source).await.unwrap();
        writer.close().await.unwrap();

        assert!(matches!(writer.state(), StreamState::Finished));
        assert_eq!(output.read().unwrap(), b"abcdefghi");
        assert_eq!(reader.read_to_end().await.unwrap(), "abcdefghi");
    }

    #[tokio::test]
    async fn test_flush_waits_for_persistence() {
        let output = TempOutput::new().unwrap();
        let mut writer = TailingWriter::create(output.path(), WriterOptions::default());

        writer.feed(Bytes::from_static(b"abc")).await.unwrap();
        SinkExt::<Bytes>::flush(&mut writer).await.unwrap();

        assert_eq!(writer.bytes_persisted(), 3);
        assert_eq!(output.read().unwrap(), b"abc");
        writer.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_after_failure_returns_sticky_error() {
        let output = TempOutput::new().unwrap();
        let mut writer = TailingWriter::create(output.path(), WriterOptions::default());
        writer.fail(Error::aborted("ERROR"));

        let result = writer.send(Bytes::from_static(b"abc")).await;
        assert!(matches!(result, Err(Error::Aborted { .. })));
        let result = SinkExt::<Bytes>::close(&mut writer).await;
        assert!(matches!(result, Err(Error::Aborted { .. })));
    }
}
