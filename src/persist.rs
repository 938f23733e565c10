//! Background task that owns the output file and writes queued chunks in order.

use crate::error::Error;
use crate::writer::Core;
use bytes::Bytes;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, mpsc};

/// Work queued for the persistence task.
#[derive(Debug)]
pub(crate) enum WriteCommand {
    Chunk(Bytes),
    Finish,
}

/// Creates the file, then drains the queue until finish, failure or shutdown.
pub(crate) async fn persist_task(
    core: Arc<Core>,
    mut queue: mpsc::UnboundedReceiver<WriteCommand>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut file = tokio::select! {
        biased;

        _ = shutdown_rx.recv() => {
            core.closed();
            return;
        }

        opened = File::create(core.path()) => match opened {
            Ok(file) => file,
            Err(e) => {
                core.fail(Error::Open {
                    path: core.path().to_path_buf(),
                    source: Arc::new(e),
                });
                core.closed();
                return;
            }
        },
    };
    core.opened();

    loop {
        tokio::select! {
            biased;

            // Abort requested; pending writes are dropped
            _ = shutdown_rx.recv() => break,

            command = queue.recv() => match command {
                Some(WriteCommand::Chunk(chunk)) => {
                    if let Err(e) = write_chunk(&mut file, &chunk).await {
                        core.fail(Error::Write(Arc::new(e)));
                        break;
                    }
                    core.persisted(chunk.len());
                }
                Some(WriteCommand::Finish) => {
                    match close_file(&mut file).await {
                        Ok(()) => core.finished(),
                        Err(e) => core.fail(Error::Close(Arc::new(e))),
                    }
                    break;
                }
                None => break,
            },
        }
    }

    drop(file);
    core.closed();
}

/// Writes a chunk and waits until it has left tokio's internal buffer, so the
/// bytes are visible to separate read handles once this returns.
async fn write_chunk(file: &mut File, chunk: &[u8]) -> std::io::Result<()> {
    file.write_all(chunk).await?;
    file.flush().await
}

async fn close_file(file: &mut File) -> std::io::Result<()> {
    file.flush().await?;
    file.sync_all().await
}
