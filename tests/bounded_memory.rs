// Integration tests for bounded buffering between producer and consumer

mod common;

use common::{gunzip_all, incompressible_data, wait_for, TrackedSource};
use futures_util::StreamExt;
use gzpipe::gzpipe::{gzip_async_reader, gzip_reader_with, GzipOptions, PipeOptions};
use gzpipe::gzip_reader;
use std::io::Read;
use std::time::Duration;
use tokio::time::timeout;

/// Anything the producer may hold beyond the pipe: copy buffer, encoder
/// buffers and the deflate window
const PRODUCER_SLACK: u64 = 512 * 1024;

/// A stalled consumer stops the producer from pulling more input
#[test]
fn test_stalled_consumer_stalls_producer() {
    let (source, stats) = TrackedSource::generated(64 * 1024 * 1024);
    let options = GzipOptions::default();
    let pipe_bytes = options.pipe.max_buffered_bytes() as u64 + options.pipe.chunk_size as u64;
    let mut reader = gzip_reader_with(source, &options);

    let mut head = vec![0u8; 64 * 1024];
    reader.read_exact(&mut head).unwrap();

    // Give the producer time to run ahead as far as it can
    std::thread::sleep(Duration::from_millis(200));
    let pulled = stats.bytes_read();
    assert!(
        pulled <= head.len() as u64 + pipe_bytes + PRODUCER_SLACK,
        "producer pulled {} bytes while the consumer read only {}",
        pulled,
        head.len()
    );

    drop(reader);
    assert!(wait_for(Duration::from_secs(10), || stats.closes() == 1));
}

/// The producer's lead over the consumer stays bounded for the whole stream
#[test]
fn test_lead_is_bounded_throughout() {
    let total = 8 * 1024 * 1024u64;
    let (source, stats) = TrackedSource::generated(total);
    let options = GzipOptions {
        pipe: PipeOptions {
            chunk_size: 16 * 1024,
            max_chunks: 2,
        },
        ..GzipOptions::default()
    };
    let bound = options.pipe.max_buffered_bytes() as u64
        + options.pipe.chunk_size as u64
        + PRODUCER_SLACK;
    let mut reader = gzip_reader_with(source, &options);

    let mut buf = vec![0u8; 8 * 1024];
    let mut consumed = 0u64;
    let mut max_lead = 0u64;
    loop {
        let n = reader.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        consumed += n as u64;
        max_lead = max_lead.max(stats.bytes_read().saturating_sub(consumed));
    }

    // Random input does not shrink, so output tracks input closely
    assert!(consumed >= total);
    assert_eq!(stats.bytes_read(), total);
    assert!(
        max_lead <= bound,
        "producer ran {} bytes ahead of the consumer (bound {})",
        max_lead,
        bound
    );
    assert_eq!(stats.closes(), 1);
}

/// Payload size does not change how far ahead the producer gets
#[test]
fn test_lead_independent_of_payload_size() {
    let mut leads = Vec::new();
    for total in [1024 * 1024u64, 32 * 1024 * 1024] {
        let (source, stats) = TrackedSource::generated(total);
        let mut reader = gzip_reader(source);
        reader.read_exact(&mut [0u8; 1024]).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        leads.push(stats.bytes_read());
        drop(reader);
        assert!(wait_for(Duration::from_secs(10), || stats.closes() == 1));
    }

    // The small payload is fully buffered or close to it; the large one must
    // not get further than the same bound
    assert!(
        leads[1] <= leads[0].max(2 * 1024 * 1024),
        "lead grew with payload size: {:?}",
        leads
    );
}

/// Async sources go through the blocking pool and come out intact
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_source_round_trip() {
    let data = incompressible_data(300_000);
    let mut reader = gzip_async_reader(std::io::Cursor::new(data.clone()), 6);

    let mut compressed = Vec::new();
    let result = timeout(
        Duration::from_secs(10),
        tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut compressed),
    )
    .await;
    assert!(result.is_ok(), "async read timed out");
    result.unwrap().unwrap();

    assert_eq!(gunzip_all(&compressed), data);
}

/// Invalid level through the async entry point
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_invalid_level() {
    let mut reader = gzip_async_reader(std::io::Cursor::new(vec![1u8; 10]), -7);
    let mut compressed = Vec::new();
    let err = tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut compressed)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
}

/// The chunk stream is bounded by the pipe's chunk size and carries every byte
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bytes_stream_chunks() {
    let data = incompressible_data(200_000);
    let options = GzipOptions {
        pipe: PipeOptions {
            chunk_size: 4096,
            max_chunks: 4,
        },
        ..GzipOptions::default()
    };
    let (source, stats) = TrackedSource::new(data.clone());
    let mut stream = Box::pin(gzip_reader_with(source, &options).into_bytes_stream());

    let mut compressed = Vec::new();
    while let Some(chunk) = timeout(Duration::from_secs(10), stream.next())
        .await
        .expect("stream stalled")
    {
        let chunk = chunk.unwrap();
        assert!(chunk.len() <= 4096);
        compressed.extend_from_slice(&chunk);
    }

    assert_eq!(gunzip_all(&compressed), data);
    assert_eq!(stats.closes(), 1);
}

/// A failing source ends the chunk stream with that error
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bytes_stream_error() {
    let (source, _) = TrackedSource::new(incompressible_data(100_000));
    let mut stream = Box::pin(gzip_reader(source.fail_on_read(3)).into_bytes_stream());

    let mut saw_error = false;
    while let Some(item) = stream.next().await {
        if let Err(e) = item {
            assert_eq!(e.kind(), std::io::ErrorKind::ConnectionReset);
            saw_error = true;
        }
    }
    assert!(saw_error, "stream ended cleanly despite a source error");
}
