/// In-memory pipe connecting one producer thread to one consumer
///
/// Wraps a bounded `tokio::sync::mpsc` channel of `Bytes` chunks. Writes are
/// split into chunks of at most `chunk_size` bytes and the channel holds at
/// most `max_chunks` of them, so buffered memory never exceeds
/// `chunk_size * max_chunks` plus the chunk the reader is draining.
///
/// The write side ends the stream explicitly, either cleanly or with an
/// error; every read after the buffered data is consumed observes that end.
/// Releasing the read side closes the channel, which makes any blocked or
/// future write fail with `BrokenPipe`.
use std::io::{self, Read, Write};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{ready, Context, Poll};

use bytes::{Buf, Bytes};
use futures_util::Stream;
use log::trace;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;

use crate::gzpipe::close::Close;
use crate::gzpipe::options::PipeOptions;

/// How the write side ended the stream
#[derive(Debug, Clone)]
enum Terminal {
    Eof,
    Failed {
        kind: io::ErrorKind,
        message: String,
    },
}

impl Terminal {
    fn from_error(error: &io::Error) -> Self {
        Terminal::Failed {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// End-of-stream state shared by both halves
#[derive(Debug, Default)]
struct Shared {
    terminal: Mutex<Option<Terminal>>,
}

impl Shared {
    /// First terminal state wins unless `force` is set
    fn set(&self, terminal: Terminal, force: bool) {
        let mut slot = self.terminal.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() || force {
            *slot = Some(terminal);
        }
    }

    fn result(&self) -> io::Result<()> {
        let slot = self.terminal.lock().unwrap_or_else(|e| e.into_inner());
        match slot.as_ref() {
            Some(Terminal::Eof) => Ok(()),
            Some(Terminal::Failed { kind, message }) => Err(io::Error::new(*kind, message.clone())),
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "pipe writer went away without closing",
            )),
        }
    }
}

fn closed_pipe() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "io: read/write on closed pipe")
}

/// Create a pipe.
///
/// Zero limits in `options` are clamped to 1.
pub fn pipe(options: &PipeOptions) -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel::<Bytes>(options.max_chunks.max(1));
    let shared = Arc::new(Shared::default());

    let writer = PipeWriter {
        tx: Some(tx),
        shared: shared.clone(),
        chunk_size: options.chunk_size.max(1),
    };

    let reader = PipeReader {
        rx,
        shared,
        current: Bytes::new(),
        closed: false,
    };

    (writer, reader)
}

/// Write half of a pipe.
///
/// Writes block while the pipe is full, so this half belongs on a thread
/// that may block (a plain thread or `spawn_blocking`), never on an async
/// task.
#[derive(Debug)]
pub struct PipeWriter {
    tx: Option<mpsc::Sender<Bytes>>,
    shared: Arc<Shared>,
    chunk_size: usize,
}

impl PipeWriter {
    /// End the stream with an error the reader will see after any data
    /// already in the pipe.
    pub fn close_with_error(&mut self, error: io::Error) {
        trace!("pipe: write side failed: {}", error);
        self.finish(Terminal::from_error(&error));
    }

    /// True once the reader is gone, meaning further writes will fail
    pub fn is_reader_closed(&self) -> bool {
        self.tx.as_ref().map_or(true, |tx| tx.is_closed())
    }

    fn finish(&mut self, terminal: Terminal) {
        if self.tx.is_none() {
            return;
        }
        // Terminal state must be visible before the channel reports closure
        self.shared.set(terminal, false);
        self.tx = None;
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let tx = self.tx.as_ref().ok_or_else(closed_pipe)?;
        if buf.is_empty() {
            return Ok(0);
        }

        let n = buf.len().min(self.chunk_size);
        tx.blocking_send(Bytes::copy_from_slice(&buf[..n]))
            .map_err(|_| closed_pipe())?;
        trace!("pipe: wrote {} bytes", n);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Close for PipeWriter {
    /// End the stream cleanly
    fn close(&mut self) -> io::Result<()> {
        self.finish(Terminal::Eof);
        Ok(())
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.finish(Terminal::Failed {
            kind: io::ErrorKind::BrokenPipe,
            message: "pipe writer dropped without close".to_string(),
        });
    }
}

/// Read half of a pipe.
///
/// Implements both blocking [`Read`] and tokio's [`AsyncRead`]. The blocking
/// impl panics if called from within an async task.
#[derive(Debug)]
pub struct PipeReader {
    rx: mpsc::Receiver<Bytes>,
    shared: Arc<Shared>,
    current: Bytes,
    closed: bool,
}

impl PipeReader {
    /// Terminate the stream with `error`, replacing whatever end the writer
    /// recorded. Used when the producer could not be started at all.
    pub(crate) fn fail(&mut self, error: io::Error) {
        self.shared.set(Terminal::from_error(&error), true);
        self.rx.close();
    }

    fn take_current(&mut self, buf: &mut [u8]) -> usize {
        let n = self.current.len().min(buf.len());
        buf[..n].copy_from_slice(&self.current[..n]);
        self.current.advance(n);
        n
    }

    /// Turn the pipe into a stream of chunks, in the shape async HTTP
    /// clients accept as a request body.
    ///
    /// The stream ends after the writer closes cleanly, or yields the
    /// terminal error once and then ends.
    pub fn into_bytes_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        futures_util::stream::unfold(Some(self), |state| async move {
            let mut reader = state?;
            if reader.closed {
                return Some((Err(closed_pipe()), None));
            }
            if !reader.current.is_empty() {
                let chunk = std::mem::take(&mut reader.current);
                return Some((Ok(chunk), Some(reader)));
            }
            match reader.rx.recv().await {
                Some(chunk) => Some((Ok(chunk), Some(reader))),
                None => match reader.shared.result() {
                    Ok(()) => None,
                    Err(e) => Some((Err(e), None)),
                },
            }
        })
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(closed_pipe());
        }
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if !self.current.is_empty() {
                return Ok(self.take_current(buf));
            }

            match self.rx.blocking_recv() {
                Some(chunk) => self.current = chunk,
                None => return self.shared.result().map(|()| 0),
            }
        }
    }
}

impl AsyncRead for PipeReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        if this.closed {
            return Poll::Ready(Err(closed_pipe()));
        }
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        loop {
            if !this.current.is_empty() {
                let n = this.current.len().min(buf.remaining());
                buf.put_slice(&this.current[..n]);
                this.current.advance(n);
                return Poll::Ready(Ok(()));
            }

            match ready!(this.rx.poll_recv(cx)) {
                Some(chunk) => this.current = chunk,
                None => return Poll::Ready(this.shared.result()),
            }
        }
    }
}

impl Close for PipeReader {
    /// Abandon the stream. Blocked and future writes fail with `BrokenPipe`.
    fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.rx.close();
        // Free anything still queued
        while self.rx.try_recv().is_ok() {}
        self.current.clear();
        Ok(())
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
