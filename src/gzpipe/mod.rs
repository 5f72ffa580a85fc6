// Module declarations
pub mod close;
pub(crate) mod compression;
mod error;
mod gunzip;
mod gzip;
mod magic_bytes;
mod options;
pub mod pipe;

// Public re-exports
pub use close::{Close, CloseChain, CloseOnDrop, NopCloser, ReadClose};
pub use compression::Level;
pub use error::GzipError;
pub use gunzip::{gunzip_reader, GunzipReader};
pub use gzip::{
    gzip_async_reader, gzip_async_reader_with, gzip_reader, gzip_reader_level, gzip_reader_with,
};
pub use magic_bytes::{is_gzipped, PeekReader, GZIP_MAGIC};
pub use options::{GzipOptions, PipeOptions};
pub use pipe::{pipe, PipeReader, PipeWriter};
