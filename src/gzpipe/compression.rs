//! Compression level handling
//!
//! Levels are carried as plain integers up to the point where the encoder is
//! built, so an invalid level becomes a construction error of the producer
//! rather than a panic at the call site.

use crate::gzpipe::error::GzipError;

/// Compression level for the gzip encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Level(i32);

impl Level {
    /// Stored blocks only
    pub const NO_COMPRESSION: Level = Level(0);
    /// Fastest deflate setting
    pub const BEST_SPEED: Level = Level(1);
    /// Smallest output
    pub const BEST_COMPRESSION: Level = Level(9);
    /// Let the codec pick (level 6)
    pub const DEFAULT: Level = Level(-1);

    /// Validate an integer level.
    ///
    /// Accepts `-1` (codec default) and `0..=9`. Huffman-only (`-2`) is not
    /// offered by the codec and is rejected like any other out-of-range value.
    pub fn new(level: i32) -> Result<Self, GzipError> {
        match level {
            -1..=9 => Ok(Level(level)),
            _ => Err(GzipError::InvalidLevel(level)),
        }
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::DEFAULT
    }
}

impl TryFrom<i32> for Level {
    type Error = GzipError;

    fn try_from(level: i32) -> Result<Self, Self::Error> {
        Level::new(level)
    }
}

impl From<Level> for flate2::Compression {
    fn from(level: Level) -> Self {
        match level.0 {
            // new() never lets a negative other than -1 through
            n if n < 0 => flate2::Compression::default(),
            n => flate2::Compression::new(n as u32),
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Level::DEFAULT => write!(f, "default"),
            Level::BEST_SPEED => write!(f, "best-speed"),
            Level::BEST_COMPRESSION => write!(f, "best-compression"),
            Level::NO_COMPRESSION => write!(f, "none"),
            Level(n) => write!(f, "{}", n),
        }
    }
}
