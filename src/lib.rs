// Library module for gzpipe
// Pull-style gzip compression and decompression over plain byte sources

pub mod gzpipe;

// Re-export the main public API
pub use gzpipe::{
    gunzip_reader, gzip_reader, gzip_reader_level, is_gzipped, Close, GzipError, Level,
    PeekReader, ReadClose,
};
