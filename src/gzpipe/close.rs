//! Release semantics for byte sources
//!
//! `Read` alone has no way to report a failure while letting go of a
//! resource, so sources handed to this crate also implement [`Close`].
//! Whoever holds a source closes it exactly once.

use std::io::{self, Read};

use log::{debug, warn};

/// A resource whose release can fail.
pub trait Close {
    /// Release the resource.
    ///
    /// Types in this crate treat a second call as a no-op.
    fn close(&mut self) -> io::Result<()>;
}

impl<T: Close + ?Sized> Close for Box<T> {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<T: Close + ?Sized> Close for &mut T {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// A readable byte source with a release operation.
pub trait ReadClose: Read + Close {}

impl<T: Read + Close + ?Sized> ReadClose for T {}

/// Wraps a plain reader whose release has nothing to do.
#[derive(Debug)]
pub struct NopCloser<R> {
    inner: R,
}

impl<R> NopCloser<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for NopCloser<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R> Close for NopCloser<R> {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Owns a resource and closes it when dropped, unless it was closed first.
///
/// Holding a source through this guard means it is still released when the
/// owner never gets to run its own release, for example when a closure that
/// owns it is dropped unrun or the thread using it panics.
#[derive(Debug)]
pub struct CloseOnDrop<R: Close> {
    what: &'static str,
    inner: Option<R>,
}

impl<R: Close> CloseOnDrop<R> {
    pub fn new(what: &'static str, inner: R) -> Self {
        Self {
            what,
            inner: Some(inner),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl<R: Read + Close> Read for CloseOnDrop<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.as_mut() {
            Some(inner) => inner.read(buf),
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "read on closed source",
            )),
        }
    }
}

impl<R: Close> Close for CloseOnDrop<R> {
    fn close(&mut self) -> io::Result<()> {
        match self.inner.take() {
            Some(mut inner) => inner.close(),
            None => Ok(()),
        }
    }
}

impl<R: Close> Drop for CloseOnDrop<R> {
    fn drop(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            debug!("{}: closing source that was never released", self.what);
            if let Err(e) = inner.close() {
                warn!("{}: error closing source on drop: {}", self.what, e);
            }
        }
    }
}

/// Runs a sequence of releases, keeping the first error.
///
/// Every step is recorded regardless of earlier failures; later errors are
/// logged and dropped.
#[derive(Debug)]
pub struct CloseChain {
    what: &'static str,
    first: Option<io::Error>,
}

impl CloseChain {
    pub fn new(what: &'static str) -> Self {
        Self { what, first: None }
    }

    /// Start the chain with an error that must win over any release error.
    pub fn with_error(what: &'static str, error: io::Error) -> Self {
        Self {
            what,
            first: Some(error),
        }
    }

    pub fn record(&mut self, result: io::Result<()>) -> &mut Self {
        if let Err(e) = result {
            match self.first {
                None => self.first = Some(e),
                Some(_) => warn!("{}: suppressed release error: {}", self.what, e),
            }
        }
        self
    }

    pub fn close(&mut self, resource: &mut dyn Close) -> &mut Self {
        let result = resource.close();
        self.record(result)
    }

    pub fn is_ok(&self) -> bool {
        self.first.is_none()
    }

    pub fn finish(self) -> io::Result<()> {
        match self.first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
