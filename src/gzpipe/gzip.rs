/// Compressing bridge: pull-style gzip output over a push-style encoder
///
/// `GzEncoder` only knows how to push compressed bytes into a writer. The
/// bridge runs the encoder on its own producer thread, feeding it from the
/// caller's source and writing into a [`pipe`](crate::gzpipe::pipe), and
/// hands the caller the pipe's read end. Everything the producer runs into
/// (bad level, source errors, a consumer that went away) ends up as the
/// terminal result of a read on that end.
use std::io::{self, Read};
use std::thread;

use flate2::write::GzEncoder;
use log::{debug, warn};
use tokio::io::AsyncRead;
use tokio_util::io::SyncIoBridge;

use crate::gzpipe::close::{Close, CloseChain, CloseOnDrop, NopCloser};
use crate::gzpipe::compression::Level;
use crate::gzpipe::options::GzipOptions;
use crate::gzpipe::pipe::{pipe, PipeReader, PipeWriter};

/// Compress `source` at [`Level::BEST_SPEED`].
///
/// Returns immediately; compression happens on a producer thread as the
/// returned reader is drained. The source is closed by the producer once it
/// is done with it.
pub fn gzip_reader<R>(source: R) -> PipeReader
where
    R: Read + Close + Send + 'static,
{
    gzip_reader_with(source, &GzipOptions::default())
}

/// Compress `source` at an integer level (`-1` for the codec default,
/// `0..=9` otherwise).
///
/// An invalid level is reported by the first read on the returned reader.
pub fn gzip_reader_level<R>(source: R, level: i32) -> PipeReader
where
    R: Read + Close + Send + 'static,
{
    gzip_reader_with(source, &GzipOptions::with_level(level))
}

/// Compress `source` with explicit options
pub fn gzip_reader_with<R>(source: R, options: &GzipOptions) -> PipeReader
where
    R: Read + Close + Send + 'static,
{
    let (writer, mut reader) = pipe(&options.pipe);
    let level = options.level;
    // Closed on drop if the thread never starts or unwinds
    let source = CloseOnDrop::new("gzip producer", source);

    let spawned = thread::Builder::new()
        .name(options.thread_name.clone())
        .spawn(move || produce(source, writer, level));

    if let Err(e) = spawned {
        warn!("gzip: failed to start producer thread: {}", e);
        reader.fail(e);
    }

    reader
}

/// Compress a tokio `AsyncRead` source.
///
/// The producer runs on the runtime's blocking pool and pulls from the
/// source through [`SyncIoBridge`]. The source has no release step beyond
/// being dropped.
///
/// # Panics
///
/// Panics if called outside of a tokio runtime.
pub fn gzip_async_reader<R>(source: R, level: i32) -> PipeReader
where
    R: AsyncRead + Unpin + Send + 'static,
{
    gzip_async_reader_with(source, &GzipOptions::with_level(level))
}

/// Like [`gzip_async_reader`], with explicit options. `thread_name` is not
/// used; blocking pool threads keep their runtime-assigned names.
pub fn gzip_async_reader_with<R>(source: R, options: &GzipOptions) -> PipeReader
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (writer, reader) = pipe(&options.pipe);
    let level = options.level;
    let source = CloseOnDrop::new(
        "gzip producer",
        NopCloser::new(SyncIoBridge::new(source)),
    );

    tokio::task::spawn_blocking(move || produce(source, writer, level));

    reader
}

/// Producer body. Owns the source and the write end, and releases both on
/// every path that returns. If the source panics, unwinding drops the
/// encoder, which terminates the pipe with `BrokenPipe`, and then the source
/// guard, which closes the source.
fn produce<R: Read + Close>(mut source: R, mut writer: PipeWriter, level: i32) {
    let level = match Level::new(level) {
        Ok(level) => level,
        Err(e) => {
            debug!("gzip: cannot build encoder: {}", e);
            let mut chain = CloseChain::with_error("gzip producer", e.into());
            chain.close(&mut source);
            if let Err(e) = chain.finish() {
                writer.close_with_error(e);
            }
            return;
        }
    };

    debug!("gzip: producer started at level {}", level);
    let mut encoder = GzEncoder::new(writer, level.into());

    let copied = match io::copy(&mut source, &mut encoder) {
        Ok(n) => encoder.try_finish().map(|()| n),
        Err(e) => Err(e),
    };

    match copied {
        Ok(n) => {
            debug!("gzip: compressed {} input bytes", n);
            match encoder.finish() {
                Ok(mut writer) => {
                    let mut chain = CloseChain::new("gzip producer");
                    chain.close(&mut source);
                    match chain.finish() {
                        Ok(()) => {
                            let _ = writer.close();
                        }
                        Err(e) => writer.close_with_error(e),
                    }
                }
                // Encoder and write end are gone; the reader sees a broken pipe
                Err(e) => {
                    debug!("gzip: finishing stream failed: {}", e);
                    if let Err(e) = source.close() {
                        warn!("gzip: failed to close source: {}", e);
                    }
                }
            }
        }
        Err(e) => {
            debug!("gzip: copy failed: {}", e);
            let mut chain = CloseChain::with_error("gzip producer", e);
            chain.close(&mut source);
            if let Err(e) = chain.finish() {
                // Poison the pipe before the encoder goes, so the trailer it
                // tries to write on drop never reaches the reader
                encoder.get_mut().close_with_error(e);
            }
            drop(encoder);
        }
    }
}
