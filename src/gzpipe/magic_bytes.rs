/// Gzip signature detection
///
/// Two ways to ask "is this gzip?": [`is_gzipped`] reads the signature off
/// the source and leaves it consumed, [`PeekReader::is_gzipped`] keeps the
/// bytes it looked at and hands them back to later reads.
use std::io::{self, BufRead, Read};

use crate::gzpipe::close::Close;
use crate::gzpipe::error::GzipError;

/// Leading bytes of every gzip member
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Fixed part of a gzip member header
pub(crate) const GZIP_HEADER_LEN: usize = 10;

const DEFLATE_METHOD: u8 = 8;
const RESERVED_FLAGS: u8 = 0xe0;

const FLAG_HCRC: u8 = 0x02;
const FLAG_EXTRA: u8 = 0x04;
const FLAG_NAME: u8 = 0x08;
const FLAG_COMMENT: u8 = 0x10;

/// Longest file name or comment accepted in a header, terminator included
pub(crate) const MAX_HEADER_FIELD: usize = 64 * 1024;

/// Step used when scanning for the end of a zero-terminated field
const FIELD_STEP: usize = 256;

/// Fill size used when `PeekReader` acts as a `BufRead`
const FILL_SIZE: usize = 8 * 1024;

/// Detect whether the source starts with the gzip signature.
///
/// Reads up to two bytes and does not put them back; callers that still need
/// the full stream should use [`PeekReader`] instead. An empty source is not
/// gzip and not an error. A source that ends after one byte is not gzip.
pub fn is_gzipped<R: Read + ?Sized>(reader: &mut R) -> io::Result<bool> {
    let mut magic = [0u8; 2];
    let mut filled = 0;

    while filled < magic.len() {
        match reader.read(&mut magic[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(filled == magic.len() && magic == GZIP_MAGIC)
}

/// Validate the fixed part of a gzip member header
pub(crate) fn check_header(header: &[u8]) -> Result<(), GzipError> {
    if header.len() < GZIP_MAGIC.len() {
        return Err(GzipError::TruncatedHeader);
    }
    if header[..2] != GZIP_MAGIC {
        return Err(GzipError::InvalidHeader {
            found: [header[0], header[1]],
        });
    }
    if header.len() < GZIP_HEADER_LEN {
        return Err(GzipError::TruncatedHeader);
    }
    if header[2] != DEFLATE_METHOD {
        return Err(GzipError::UnsupportedMethod(header[2]));
    }
    if header[3] & RESERVED_FLAGS != 0 {
        return Err(GzipError::ReservedFlags(header[3]));
    }
    Ok(())
}

/// Validate a complete gzip member header without consuming it.
///
/// Checks the fixed part, then walks whichever of the extra field, file
/// name, comment and header CRC the flags announce. Returns the header
/// length; every header byte is left buffered in `reader`.
pub(crate) fn check_full_header<R: Read>(
    reader: &mut PeekReader<R>,
) -> Result<usize, GzipError> {
    let flags = {
        let fixed = reader.peek(GZIP_HEADER_LEN)?;
        check_header(fixed)?;
        fixed[3]
    };
    let mut len = GZIP_HEADER_LEN;

    if flags & FLAG_EXTRA != 0 {
        let prefix = reader.peek(len + 2)?;
        if prefix.len() < len + 2 {
            return Err(GzipError::TruncatedHeader);
        }
        let xlen = u16::from_le_bytes([prefix[len], prefix[len + 1]]) as usize;
        len += 2 + xlen;
        if reader.peek(len)?.len() < len {
            return Err(GzipError::TruncatedHeader);
        }
    }
    if flags & FLAG_NAME != 0 {
        len = zero_terminated_end(reader, len, "file name")?;
    }
    if flags & FLAG_COMMENT != 0 {
        len = zero_terminated_end(reader, len, "comment")?;
    }
    if flags & FLAG_HCRC != 0 {
        len += 2;
        if reader.peek(len)?.len() < len {
            return Err(GzipError::TruncatedHeader);
        }
    }
    Ok(len)
}

/// Offset just past the zero byte ending a field that starts at `start`
fn zero_terminated_end<R: Read>(
    reader: &mut PeekReader<R>,
    start: usize,
    field: &'static str,
) -> Result<usize, GzipError> {
    let mut scanned = start;
    loop {
        let want = (scanned + FIELD_STEP).min(start + MAX_HEADER_FIELD);
        let buf = reader.peek(want)?;
        if let Some(i) = buf[scanned..].iter().position(|&b| b == 0) {
            return Ok(scanned + i + 1);
        }
        if buf.len() < want {
            return Err(GzipError::TruncatedHeader);
        }
        if want == start + MAX_HEADER_FIELD {
            return Err(GzipError::HeaderFieldTooLong(field));
        }
        scanned = want;
    }
}

/// Reader that can look ahead without consuming.
///
/// Bytes returned by [`peek`](PeekReader::peek) are replayed by subsequent
/// reads, so sniffing leaves the stream intact.
#[derive(Debug)]
pub struct PeekReader<R> {
    inner: R,
    buf: Vec<u8>,
    pos: usize,
}

impl<R> PeekReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            pos: 0,
        }
    }

    /// Bytes peeked but not yet read
    pub fn buffered(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Unwrap the source. Buffered bytes are lost; check
    /// [`buffered`](PeekReader::buffered) first if that matters.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn discard_consumed(&mut self) {
        if self.pos >= self.buf.len() {
            self.buf.clear();
            self.pos = 0;
        } else if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
    }
}

impl<R: Read> PeekReader<R> {
    /// Look at up to `n` upcoming bytes.
    ///
    /// Returns fewer than `n` bytes only at end of stream.
    pub fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        self.discard_consumed();

        while self.buf.len() < n {
            let start = self.buf.len();
            self.buf.resize(n, 0);
            match self.inner.read(&mut self.buf[start..]) {
                Ok(0) => {
                    self.buf.truncate(start);
                    break;
                }
                Ok(read) => self.buf.truncate(start + read),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => self.buf.truncate(start),
                Err(e) => {
                    self.buf.truncate(start);
                    return Err(e);
                }
            }
        }

        let end = n.min(self.buf.len());
        Ok(&self.buf[..end])
    }

    /// Non-destructive gzip signature check
    pub fn is_gzipped(&mut self) -> io::Result<bool> {
        Ok(self.peek(GZIP_MAGIC.len())? == GZIP_MAGIC)
    }
}

impl<R: Read> Read for PeekReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.buf.len() {
            let pending = &self.buf[self.pos..];
            let n = pending.len().min(out.len());
            out[..n].copy_from_slice(&pending[..n]);
            self.consume(n);
            return Ok(n);
        }
        self.inner.read(out)
    }
}

impl<R: Read> BufRead for PeekReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.buf.len() {
            self.buf.clear();
            self.pos = 0;
            self.buf.resize(FILL_SIZE, 0);
            let read = loop {
                match self.inner.read(&mut self.buf) {
                    Ok(read) => break read,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        self.buf.clear();
                        return Err(e);
                    }
                }
            };
            self.buf.truncate(read);
        }
        Ok(&self.buf[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.buf.len());
        if self.pos == self.buf.len() {
            self.buf.clear();
            self.pos = 0;
        }
    }
}

impl<R: Close> Close for PeekReader<R> {
    fn close(&mut self) -> io::Result<()> {
        self.buf.clear();
        self.pos = 0;
        self.inner.close()
    }
}
