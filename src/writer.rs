//! The write side: one producer appending to a file that any number of
//! readers can tail from offset zero.
//!
//! All coordinator state sits behind a single lock. Every transition
//! (append, persisted progress, finish, failure, reader pull) ends with a
//! fan-out that re-serves each reader currently waiting for its next piece.

use crate::error::{Error, Result};
use crate::options::{ReadOptions, WriterOptions};
use crate::persist::{WriteCommand, persist_task};
use crate::reader::ReaderCursor;
use crate::stream::TailReader;
use crate::window::SlidingWindow;
use bytes::Bytes;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

pub(crate) type ReaderId = u64;

/// Overall state of the stream. Once terminal it never changes.
#[derive(Debug, Clone)]
pub enum StreamState {
    Open,
    Finished,
    Failed(Error),
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamState::Open)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StreamState::Failed(_))
    }
}

/// Lifecycle notifications re-emitted from the underlying file.
#[derive(Debug, Clone)]
pub enum WriterEvent {
    /// The output file was created or truncated.
    Opened,
    /// The stream failed; carries the first recorded error.
    Failed(Error),
    /// The file handle was released.
    Closed,
}

/// What a waiting reader receives from one serve decision.
#[derive(Debug)]
pub(crate) enum Delivery {
    Chunk(Bytes),
    Disk { start: u64, end: u64 },
    End,
    Failed(Error),
}

/// Snapshot republished after every fan-out.
#[derive(Debug, Clone)]
pub(crate) struct Progress {
    pub(crate) accepted: u64,
    pub(crate) persisted: u64,
    pub(crate) state: StreamState,
}

#[derive(Debug)]
struct ReaderSlot {
    position: u64,
    /// Present while the reader waits for its next piece.
    pending: Option<oneshot::Sender<Delivery>>,
}

#[derive(Debug)]
struct Shared {
    state: StreamState,
    window: SlidingWindow,
    persisted: u64,
    readers: HashMap<ReaderId, ReaderSlot>,
    next_reader_id: ReaderId,
    /// Taken once finish is requested or the stream fails.
    queue: Option<mpsc::UnboundedSender<WriteCommand>>,
}

impl Shared {
    fn progress(&self) -> Progress {
        Progress {
            accepted: self.window.end(),
            persisted: self.persisted,
            state: self.state.clone(),
        }
    }
}

/// State shared by the producer handle, the persistence task and readers.
#[derive(Debug)]
pub(crate) struct Core {
    path: PathBuf,
    shared: Mutex<Shared>,
    progress: watch::Sender<Progress>,
    events: broadcast::Sender<WriterEvent>,
    shutdown: broadcast::Sender<()>,
}

impl Core {
    /// Builds the core along with the receiving ends the persistence task needs.
    pub(crate) fn new(
        path: PathBuf,
        options: &WriterOptions,
    ) -> (
        Arc<Self>,
        mpsc::UnboundedReceiver<WriteCommand>,
        broadcast::Receiver<()>,
    ) {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (events_tx, _) = broadcast::channel(16);

        let shared = Shared {
            state: StreamState::Open,
            window: SlidingWindow::new(options.buffer_size.max(1)),
            persisted: 0,
            readers: HashMap::new(),
            next_reader_id: 0,
            queue: Some(queue_tx),
        };
        let (progress, _) = watch::channel(shared.progress());

        let core = Arc::new(Core {
            path,
            shared: Mutex::new(shared),
            progress,
            events: events_tx,
            shutdown: shutdown_tx,
        });
        (core, queue_rx, shutdown_rx)
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn append(&self, chunk: Bytes) -> Result<()> {
        let mut guard = self.shared.lock();
        let shared = &mut *guard;

        if let StreamState::Failed(error) = &shared.state {
            return Err(error.clone());
        }
        let Some(queue) = &shared.queue else {
            return Err(Error::WriterClosed);
        };
        if chunk.is_empty() {
            return Ok(());
        }
        if queue.send(WriteCommand::Chunk(chunk.clone())).is_err() {
            return Err(Error::WriterClosed);
        }

        shared.window.append(chunk);
        self.fan_out(shared);
        Ok(())
    }

    /// Stops accepting data; the stream finishes once queued writes drain.
    pub(crate) fn request_finish(&self) {
        let mut shared = self.shared.lock();
        if shared.state.is_terminal() {
            return;
        }
        if let Some(queue) = shared.queue.take() {
            tracing::debug!(path = %self.path.display(), bytes = shared.window.end(), "Finish requested");
            let _ = queue.send(WriteCommand::Finish);
        }
    }

    /// Records the first failure; later calls are discarded.
    pub(crate) fn fail(&self, error: Error) {
        let mut guard = self.shared.lock();
        let shared = &mut *guard;

        if shared.state.is_terminal() {
            tracing::debug!(path = %self.path.display(), error = %error, "Discarding secondary error");
            return;
        }

        tracing::warn!(path = %self.path.display(), error = %error, "Stream failed");
        shared.state = StreamState::Failed(error.clone());
        shared.queue = None;
        let _ = self.shutdown.send(());
        let _ = self.events.send(WriterEvent::Failed(error));
        self.fan_out(shared);
    }

    pub(crate) fn persisted(&self, bytes: usize) {
        let mut guard = self.shared.lock();
        let shared = &mut *guard;
        shared.persisted += bytes as u64;
        self.fan_out(shared);
    }

    pub(crate) fn finished(&self) {
        let mut guard = self.shared.lock();
        let shared = &mut *guard;
        if shared.state.is_terminal() {
            return;
        }
        tracing::debug!(path = %self.path.display(), bytes = shared.persisted, "Stream finished");
        shared.state = StreamState::Finished;
        self.fan_out(shared);
    }

    pub(crate) fn opened(&self) {
        tracing::debug!(path = %self.path.display(), "Output file opened");
        let _ = self.events.send(WriterEvent::Opened);
    }

    pub(crate) fn closed(&self) {
        tracing::debug!(path = %self.path.display(), "Output file closed");
        let _ = self.events.send(WriterEvent::Closed);
    }

    pub(crate) fn attach(&self) -> ReaderId {
        let mut shared = self.shared.lock();
        let id = shared.next_reader_id;
        shared.next_reader_id += 1;
        shared.readers.insert(
            id,
            ReaderSlot {
                position: 0,
                pending: None,
            },
        );
        tracing::debug!(reader_id = id, "Reader attached");
        id
    }

    pub(crate) fn detach(&self, id: ReaderId) {
        if self.shared.lock().readers.remove(&id).is_some() {
            tracing::debug!(reader_id = id, "Reader detached");
        }
    }

    /// Parks a request for the reader's next piece and serves it right away.
    pub(crate) fn pull(&self, id: ReaderId) -> oneshot::Receiver<Delivery> {
        let (tx, rx) = oneshot::channel();
        let mut guard = self.shared.lock();
        let shared = &mut *guard;
        if let Some(slot) = shared.readers.get_mut(&id) {
            slot.pending = Some(tx);
            serve(id, slot, &shared.state, &shared.window, shared.persisted);
        }
        rx
    }

    pub(crate) fn snapshot(&self) -> Progress {
        self.shared.lock().progress()
    }

    pub(crate) fn reader_count(&self) -> usize {
        self.shared.lock().readers.len()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<WriterEvent> {
        self.events.subscribe()
    }

    /// Resolves once `target` bytes are persisted, or with the sticky error.
    pub(crate) fn wait_persisted(&self, target: u64) -> impl Future<Output = Result<()>> + Send + use<> {
        let rx = self.progress.subscribe();
        wait_until(rx, move |p| p.persisted >= target)
    }

    /// Resolves with the terminal outcome of the stream.
    pub(crate) fn wait_terminal(&self) -> impl Future<Output = Result<()>> + Send + use<> {
        let rx = self.progress.subscribe();
        wait_until(rx, |p| p.state.is_terminal())
    }

    fn fan_out(&self, shared: &mut Shared) {
        for (id, slot) in shared.readers.iter_mut() {
            if slot.pending.is_some() {
                serve(*id, slot, &shared.state, &shared.window, shared.persisted);
            }
        }
        self.progress.send_replace(shared.progress());
    }
}

async fn wait_until<F>(mut rx: watch::Receiver<Progress>, done: F) -> Result<()>
where
    F: Fn(&Progress) -> bool,
{
    let state = rx
        .wait_for(|p| p.state.is_failed() || done(p))
        .await
        .map(|p| p.state.clone())
        .map_err(|_| Error::Cancelled)?;
    match state {
        StreamState::Failed(error) => Err(error),
        _ => Ok(()),
    }
}

/// Runs one serve decision for a waiting reader, delivering if it can.
fn serve(
    id: ReaderId,
    slot: &mut ReaderSlot,
    state: &StreamState,
    window: &SlidingWindow,
    persisted: u64,
) {
    let Some(sender) = slot.pending.take() else {
        return;
    };

    let before = slot.position;
    match decide(slot, state, window, persisted) {
        Some(delivery) => {
            tracing::trace!(reader_id = id, position = slot.position, ?delivery, "Serving reader");
            if sender.send(delivery).is_err() {
                // Nobody took the piece; it must be served again.
                slot.position = before;
            }
        }
        None => {
            tracing::trace!(reader_id = id, position = slot.position, "Reader stalled");
            slot.pending = Some(sender);
        }
    }
}

/// Picks the source of the reader's next piece, advancing its position.
/// `None` means nothing can be served yet.
fn decide(
    slot: &mut ReaderSlot,
    state: &StreamState,
    window: &SlidingWindow,
    persisted: u64,
) -> Option<Delivery> {
    if let StreamState::Failed(error) = state {
        return Some(Delivery::Failed(error.clone()));
    }

    if slot.position == window.end() {
        return match state {
            StreamState::Finished => Some(Delivery::End),
            _ => None,
        };
    }

    if slot.position >= window.start() {
        return Some(match window.read(slot.position) {
            Ok(chunk) => {
                slot.position += chunk.len() as u64;
                Delivery::Chunk(chunk)
            }
            Err(error) => Delivery::Failed(error),
        });
    }

    // Evicted from memory. The range is reserved before the disk read runs
    // so later fan-outs do not serve it twice.
    if persisted <= slot.position {
        return None;
    }
    let start = slot.position;
    slot.position = persisted;
    Some(Delivery::Disk {
        start,
        end: persisted,
    })
}

/// The producer side of a tailed file.
///
/// Bytes appended here are written to the file in order and can be read back
/// by any number of readers attached at any time, each from offset zero.
pub struct TailingWriter {
    pub(crate) core: Arc<Core>,
    pub(crate) flushing: Option<BoxFuture<'static, Result<()>>>,
    pub(crate) closing: Option<BoxFuture<'static, Result<()>>>,
}

impl TailingWriter {
    /// Creates (or truncates) the file at `path` and starts persisting into it.
    ///
    /// Must be called from within a tokio runtime. Failing to open the file is
    /// reported through the stream state, not here.
    pub fn create<P: AsRef<Path>>(path: P, options: WriterOptions) -> Self {
        let path = path.as_ref().to_path_buf();
        let (core, queue, shutdown_rx) = Core::new(path, &options);

        tracing::debug!(path = %core.path().display(), buffer_size = options.buffer_size, "Creating tailing writer");
        tokio::spawn(persist_task(core.clone(), queue, shutdown_rx));

        Self {
            core,
            flushing: None,
            closing: None,
        }
    }

    pub fn path(&self) -> &Path {
        self.core.path()
    }

    /// Accepts the next chunk. Does not wait for it to reach the file.
    pub fn append(&self, chunk: impl Into<Bytes>) -> Result<()> {
        self.core.append(chunk.into())
    }

    /// Signals that no more data will be appended.
    pub fn end(&self) {
        self.core.request_finish();
    }

    /// Ends the stream and waits until the file is closed.
    pub async fn finish(&self) -> Result<()> {
        self.end();
        self.closed().await
    }

    /// Fails the stream with `error`. Only the first failure is kept.
    pub fn fail(&self, error: Error) {
        self.core.fail(error);
    }

    /// Fails with `error` if given; otherwise ends the stream.
    pub fn destroy(&self, error: Option<Error>) {
        match error {
            Some(error) => self.fail(error),
            None => self.end(),
        }
    }

    /// Waits until every byte accepted so far has been written to the file.
    pub async fn flush(&self) -> Result<()> {
        let target = self.core.snapshot().accepted;
        self.core.wait_persisted(target).await
    }

    /// Waits for the terminal state and returns its outcome.
    pub async fn closed(&self) -> Result<()> {
        self.core.wait_terminal().await
    }

    /// Attaches a new reader positioned at the start of the stream.
    pub fn attach_reader(&self, options: ReadOptions) -> ReaderCursor {
        ReaderCursor::attach(self.core.clone(), options)
    }

    /// Attaches a reader with default options as a byte stream.
    pub fn reader(&self) -> TailReader {
        self.attach_reader(ReadOptions::default()).into_stream()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WriterEvent> {
        self.core.subscribe()
    }

    pub fn state(&self) -> StreamState {
        self.core.snapshot().state
    }

    /// Total bytes accepted from the producer.
    pub fn bytes_accepted(&self) -> u64 {
        self.core.snapshot().accepted
    }

    /// Bytes confirmed written to the file.
    pub fn bytes_persisted(&self) -> u64 {
        self.core.snapshot().persisted
    }

    pub fn reader_count(&self) -> usize {
        self.core.reader_count()
    }
}

impl Drop for TailingWriter {
    fn drop(&mut self) {
        let shared = self.core.shared.lock();
        let abandoned = !shared.state.is_terminal() && shared.queue.is_some();
        drop(shared);

        if abandoned {
            self.core.fail(Error::aborted("writer dropped before finish"));
        }
    }
}
