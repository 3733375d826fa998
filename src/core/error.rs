use std::fmt;

/// Error classification, mirroring the propagation policy in the design doc:
/// `NotFound` is recovered locally by callers, `TransientIO` is retried once
/// at the page-store layer, everything else is surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An index option was missing or outside its accepted range.
    InvalidOption,
    /// Magic/version mismatch, impossible offsets, or a broken chain pointer.
    CorruptFormat,
    /// A page-store mmap operation failed; retried once before being
    /// surfaced fatally (`page::store::map_with_retry`).
    TransientIO,
    /// Arena allocation failed; fatal to the current transaction.
    OutOfMemory,
    /// The index was concurrently dropped mid-scan.
    Conflict,
    /// Term or doc-ref absent. Not really an error, but carried through the
    /// same enum so `?` composes; callers should prefer the sentinel-valued
    /// APIs (`get_postings` returning `None`, `get_doc_length` returning -1).
    NotFound,
    /// A host-interrupt checkpoint tripped.
    Canceled,
    /// Generic I/O failure, not covered by the more specific kinds above.
    Io,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Error { kind, context: context.into() }
    }

    pub fn corrupt(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::CorruptFormat, context)
    }

    pub fn invalid_option(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidOption, context)
    }

    pub fn out_of_memory(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::OutOfMemory, context)
    }

    pub fn canceled(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Canceled, context)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error { kind: ErrorKind::Io, context: err.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
