use crate::gzpipe::compression::Level;

/// Buffering limits for a bridge pipe
#[derive(Debug, Clone)]
pub struct PipeOptions {
    /// Largest chunk a single write hands to the reader
    pub chunk_size: usize,
    /// Chunks that may sit in the pipe before writes block
    pub max_chunks: usize,
}

impl PipeOptions {
    /// Upper bound on bytes buffered inside the pipe
    pub fn max_buffered_bytes(&self) -> usize {
        self.chunk_size.max(1) * self.max_chunks.max(1)
    }
}

impl Default for PipeOptions {
    fn default() -> Self {
        Self {
            chunk_size: 32 * 1024,
            max_chunks: 4,
        }
    }
}

/// Options for the compressing bridge
#[derive(Debug, Clone)]
pub struct GzipOptions {
    /// Integer level, validated when the producer builds its encoder
    pub level: i32,
    pub pipe: PipeOptions,
    pub thread_name: String,
}

impl GzipOptions {
    pub fn with_level(level: i32) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }
}

impl Default for GzipOptions {
    fn default() -> Self {
        Self {
            level: Level::BEST_SPEED.get(),
            pipe: PipeOptions::default(),
            thread_name: "gzip-producer".to_string(),
        }
    }
}
