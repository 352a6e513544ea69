//! Errors of constructing a shared memory object.
use std::io;

use thiserror::Error;

/// Result alias for shared memory operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The failure of a constructor.
///
/// A failed construction never produces a live object. Whatever was acquired before the failing
/// step has already been released by the time this is returned.
#[derive(Debug, Error)]
pub enum Error {
    /// An argument that can not describe a mapping, such as an empty name.
    #[error("{tag}: {reason}")]
    InvalidArgument {
        tag: &'static str,
        reason: &'static str,
    },
    /// A call into the OS failed while opening, sizing or mapping the object.
    #[error("{tag}: {op}() failed: {name}: {source}")]
    Resource {
        tag: &'static str,
        op: &'static str,
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Classification of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    Resource,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Error::Resource { .. } => ErrorKind::Resource,
        }
    }

    /// The name of the failing OS call, if any.
    pub fn op(&self) -> Option<&'static str> {
        match self {
            Error::InvalidArgument { .. } => None,
            Error::Resource { op, .. } => Some(op),
        }
    }

    /// The errno reported by the failing OS call, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::InvalidArgument { .. } => None,
            Error::Resource { source, .. } => source.raw_os_error(),
        }
    }
}
