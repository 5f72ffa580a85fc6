//! Decompressing source wrapper
//!
//! The whole member header, optional fields included, is validated before a
//! reader is handed out, so a source that is not gzip fails at construction
//! rather than on the first read. Closing
//! the wrapper also closes the source it was built from; the decoder only
//! owns its own state.

use std::io::{self, Read};

use flate2::bufread::MultiGzDecoder;
use log::{debug, warn};

use crate::gzpipe::close::{Close, CloseChain};
use crate::gzpipe::error::GzipError;
use crate::gzpipe::magic_bytes::{check_full_header, PeekReader};

/// Decompressed view of a gzip source.
///
/// Concatenated gzip members are decoded back to back.
pub struct GunzipReader<R: Read + Close> {
    decoder: Option<MultiGzDecoder<PeekReader<R>>>,
}

/// Wrap a gzip-compressed source.
///
/// Fails if the leading bytes are not a complete gzip header, including any
/// extra field, file name, comment or header CRC its flags announce. The
/// header bytes stay buffered for the decoder. On failure the source
/// has already been closed; a failure to close it is logged and the header
/// error is returned.
pub fn gunzip_reader<R: Read + Close>(source: R) -> Result<GunzipReader<R>, GzipError> {
    let mut source = PeekReader::new(source);

    if let Err(e) = check_full_header(&mut source) {
        debug!("gunzip: rejecting source: {}", e);
        if let Err(close_err) = source.close() {
            warn!("gunzip: failed to close rejected source: {}", close_err);
        }
        return Err(e);
    }

    Ok(GunzipReader {
        decoder: Some(MultiGzDecoder::new(source)),
    })
}

impl<R: Read + Close> GunzipReader<R> {
    pub fn is_closed(&self) -> bool {
        self.decoder.is_none()
    }
}

impl<R: Read + Close> Read for GunzipReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.decoder.as_mut() {
            Some(decoder) => decoder.read(buf),
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "read on closed gzip reader",
            )),
        }
    }
}

impl<R: Read + Close> Close for GunzipReader<R> {
    /// Release the decoder, then the wrapped source.
    ///
    /// Dropping the decoder state cannot fail, so any error comes from the
    /// source.
    fn close(&mut self) -> io::Result<()> {
        let Some(decoder) = self.decoder.take() else {
            return Ok(());
        };

        let mut source = decoder.into_inner();
        let mut chain = CloseChain::new("gunzip");
        chain.close(&mut source);
        chain.finish()
    }
}

impl<R: Read + Close> Drop for GunzipReader<R> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("gunzip: error closing source on drop: {}", e);
        }
    }
}
