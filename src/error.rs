//! Typed failures of a diff run.
//!
//! Every variant carries the path it concerns so the binary can print a single
//! diagnostic line. [`DiffError::kind`] folds the variants into the three classes
//! callers care about: precondition, I/O and format failures.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Which of the two input archives an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    Reference,
    Comparison,
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRole::Reference => f.write_str("reference image"),
            ImageRole::Comparison => f.write_str("image to compare"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Detected before any archive is scanned.
    Precondition,
    Io,
    /// The bytes are not a valid tar stream.
    Format,
}

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("Unable to find {role}: {}", path.display())]
    MissingImage { role: ImageRole, path: PathBuf },

    #[error("The {role} is not a regular file: {}", path.display())]
    NotAFile { role: ImageRole, path: PathBuf },

    #[error("Target file delete attempt failed: {}", path.display())]
    TargetNotRemovable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed tar archive {}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DiffError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DiffError::MissingImage { .. }
            | DiffError::NotAFile { .. }
            | DiffError::TargetNotRemovable { .. } => ErrorKind::Precondition,
            DiffError::Open { .. } | DiffError::Read { .. } | DiffError::Write { .. } => {
                ErrorKind::Io
            }
            DiffError::Format { .. } => ErrorKind::Format,
        }
    }

    /// Classifies an error raised while walking tar headers.
    ///
    /// The `tar` crate reports bad checksums, bad octal fields and truncated
    /// records as plain `io::Error`s; anything that is not an OS-level failure is
    /// treated as broken framing.
    pub(crate) fn from_scan(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::InvalidData
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::Other => DiffError::Format { path, source },
            _ => DiffError::Read { path, source },
        }
    }
}

pub type Result<T, E = DiffError> = std::result::Result<T, E>;
