pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`].
///
/// Callers that only care about *why* a directory failed to decode (bad framing,
/// a broken record, or metadata that contradicts itself) can match on this
/// instead of every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The stream is not a directory stream, or its framing is broken.
    Format,
    /// A record could not be parsed or the byte stream failed mid-read.
    Decode,
    /// The records parsed fine but describe an impossible directory.
    Consistency,
}

#[derive(Debug)]
pub enum Error {
    InvalidFormat(String),
    UnexpectedStreamType {
        expected: String,
        actual: String,
    },
    UnexpectedEof,
    IoError(std::io::Error),
    JsonError(serde_json::Error),
    InconsistentBundleSize {
        name: String,
        expected: u64,
        actual: u64,
    },
    BundleSizeOverflow {
        name: String,
    },
    MissingObjectId(String),
    NestedBundle {
        parent: String,
        child: String,
    },
    UnsortedEntries {
        previous: String,
        current: String,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match *self {
            Error::InvalidFormat(_) | Error::UnexpectedStreamType { .. } => ErrorKind::Format,
            Error::UnexpectedEof | Error::IoError(_) | Error::JsonError(_) => ErrorKind::Decode,
            Error::InconsistentBundleSize { .. }
            | Error::BundleSizeOverflow { .. }
            | Error::MissingObjectId(_)
            | Error::NestedBundle { .. }
            | Error::UnsortedEntries { .. } => ErrorKind::Consistency,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            Error::InvalidFormat(ref msg) => write!(f, "Invalid format: {msg}"),
            Error::UnexpectedStreamType {
                ref expected,
                ref actual,
            } => write!(
                f,
                "Unexpected stream type: expected '{expected}', got '{actual}'"
            ),
            Error::UnexpectedEof => write!(f, "Unexpected end of stream inside a record"),
            Error::IoError(ref err) => write!(f, "{err}"),
            Error::JsonError(ref err) => write!(f, "{err}"),
            Error::InconsistentBundleSize {
                ref name,
                expected,
                actual,
            } => write!(
                f,
                "Inconsistent size of '{name}': expected {expected}, got {actual}"
            ),
            Error::BundleSizeOverflow { ref name } => {
                write!(f, "Bundled children of '{name}' overflow a 64-bit size")
            }
            Error::MissingObjectId(ref name) => {
                write!(f, "Bundle '{name}' has no object id")
            }
            Error::NestedBundle {
                ref parent,
                ref child,
            } => write!(f, "Bundled child '{child}' of '{parent}' carries its own bundle"),
            Error::UnsortedEntries {
                ref previous,
                ref current,
            } => write!(f, "Entries out of order: '{current}' after '{previous}'"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::IoError(ref err) => Some(err),
            Error::JsonError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl std::convert::From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Error {
        if error.kind() == std::io::ErrorKind::UnexpectedEof {
            return Error::UnexpectedEof;
        }
        Error::IoError(error)
    }
}

impl std::convert::From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Error {
        Error::JsonError(error)
    }
}
