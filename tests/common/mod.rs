// Shared test utilities
#![allow(dead_code)]

use flate2::read::MultiGzDecoder;
use gzpipe::Close;
use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Route `log` output through the test harness; safe to call repeatedly
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Generate deterministic test data of a given size
pub fn create_test_data(size: usize) -> Vec<u8> {
    // Create a repeating pattern for easier debugging
    let pattern = b"TESTDATA";
    let mut data = Vec::with_capacity(size);

    for i in 0..size {
        data.push(pattern[i % pattern.len()]);
    }

    data
}

/// Deterministic data that deflate cannot shrink
pub fn incompressible_data(size: usize) -> Vec<u8> {
    let mut state = 0x9e37_79b9_7f4a_7c15u64;
    let mut data = Vec::with_capacity(size);
    while data.len() < size {
        // xorshift64
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        data.extend_from_slice(&state.to_le_bytes());
    }
    data.truncate(size);
    data
}

/// Decompress data using gzip, following concatenated members
pub fn gunzip_all(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    MultiGzDecoder::new(data)
        .read_to_end(&mut out)
        .expect("Failed to decompress gzip data");
    out
}

/// Counters shared between a test and a `TrackedSource` it gave away
#[derive(Clone, Default)]
pub struct SourceStats {
    pub closes: Arc<AtomicUsize>,
    pub reads: Arc<AtomicUsize>,
    pub bytes_read: Arc<AtomicU64>,
}

impl SourceStats {
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::SeqCst)
    }
}

enum Content {
    Buffer(io::Cursor<Vec<u8>>),
    /// Incompressible bytes generated on the fly, up to a limit
    Generated { state: u64, remaining: u64 },
}

/// Source that records reads and closes and can fail on a chosen read call
pub struct TrackedSource {
    content: Content,
    stats: SourceStats,
    fail_on_read: Option<usize>,
    fail_close: bool,
}

impl TrackedSource {
    pub fn new(data: Vec<u8>) -> (Self, SourceStats) {
        Self::with_content(Content::Buffer(io::Cursor::new(data)))
    }

    pub fn generated(len: u64) -> (Self, SourceStats) {
        Self::with_content(Content::Generated {
            state: 0x2545_f491_4f6c_dd1d,
            remaining: len,
        })
    }

    fn with_content(content: Content) -> (Self, SourceStats) {
        let stats = SourceStats::default();
        let source = Self {
            content,
            stats: stats.clone(),
            fail_on_read: None,
            fail_close: false,
        };
        (source, stats)
    }

    /// Make the n-th read call (1-based) fail
    pub fn fail_on_read(mut self, n: usize) -> Self {
        self.fail_on_read = Some(n);
        self
    }

    pub fn fail_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

impl Read for TrackedSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let call = self.stats.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if Some(call) == self.fail_on_read {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "source failed mid-read",
            ));
        }

        let n = match &mut self.content {
            Content::Buffer(cursor) => cursor.read(buf)?,
            Content::Generated { state, remaining } => {
                let n = (*remaining).min(buf.len() as u64) as usize;
                for byte in &mut buf[..n] {
                    *state ^= *state << 13;
                    *state ^= *state >> 7;
                    *state ^= *state << 17;
                    *byte = *state as u8;
                }
                *remaining -= n as u64;
                n
            }
        };

        self.stats.bytes_read.fetch_add(n as u64, Ordering::SeqCst);
        Ok(n)
    }
}

impl Close for TrackedSource {
    fn close(&mut self) -> io::Result<()> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            Err(io::Error::new(io::ErrorKind::Other, "source close failed"))
        } else {
            Ok(())
        }
    }
}

/// Poll `condition` until it holds or `limit` elapses
pub fn wait_for(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
