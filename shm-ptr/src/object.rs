//! The contract of a named shared memory object.
use std::io;

use crate::{Error, Flags};

/// A named region of shared memory, mapped into this process.
///
/// Two objects with the same name refer to the same memory. Each platform provides exactly one
/// implementation, selected at build time as [`NativeShmObject`](crate::NativeShmObject).
///
/// Implementations own the OS handle and the mapping. They are not `Clone`: a copy would imply
/// two independent unmap and unlink sequences for one physical resource. Dropping the object
/// unmaps the region and removes the name from the OS namespace.
pub trait ShmObject {
    /// The fields recorded at construction.
    fn info(&self) -> &ObjectInfo;

    /// The mapped address, or null if nothing is mapped.
    ///
    /// The address is valid for [`size`](Self::size) bytes while `self` is alive.
    fn get(&self) -> *mut u8;

    /// The normalized name of the object.
    fn name(&self) -> &str {
        self.info().name()
    }

    /// The flags as requested by the caller, not the translated platform value.
    fn flags(&self) -> Flags {
        self.info().flags()
    }

    /// The requested length of the mapping.
    ///
    /// This is the requested length and not the length the OS allocated, which is usually
    /// rounded up to a page.
    fn size(&self) -> usize {
        self.info().size()
    }

    /// The offset into the backing object at which the mapping begins.
    fn offset(&self) -> u64 {
        self.info().offset()
    }
}

/// The record every implementation keeps about its object.
///
/// Also provides the error constructors that implementations use, so that all diagnostics
/// carry the implementation's tag and the object name in the same format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectInfo {
    tag: &'static str,
    name: String,
    flags: Flags,
    size: usize,
    offset: u64,
}

impl ObjectInfo {
    /// Record the fields of an object.
    ///
    /// The `name` should already be normalized by the implementation, this performs no
    /// validation and no OS interaction.
    pub fn new(tag: &'static str, name: String, flags: Flags, size: usize, offset: u64) -> Self {
        ObjectInfo {
            tag,
            name,
            flags,
            size,
            offset,
        }
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// An error for an argument rejected before any OS call was made.
    pub fn invalid_argument(tag: &'static str, reason: &'static str) -> Error {
        Error::InvalidArgument { tag, reason }
    }

    /// An error for the failing OS call `op` on this object.
    pub fn resource_error(&self, op: &'static str, source: io::Error) -> Error {
        Error::Resource {
            tag: self.tag,
            op,
            name: self.name.clone(),
            source,
        }
    }

    /// Like [`Self::resource_error`], with the calling thread's last OS error.
    pub fn last_os_error(&self, op: &'static str) -> Error {
        self.resource_error(op, io::Error::last_os_error())
    }
}
