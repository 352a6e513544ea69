//! Builder for opening shared memory objects with non-default settings.
use core::fmt;
use core::mem::size_of;
use std::sync::Arc;

use bytemuck::AnyBitPattern;

use crate::posix::DEFAULT_MODE;
use crate::tracer::{AllocationTracer, NoopTracer};
use crate::{Flags, NativeShmObject, Result, ShmPtr};

/// Options for opening a shared memory object, in the manner of `std::fs::OpenOptions`.
///
/// ```no_run
/// use shm_ptr::{Flags, ShmOptions, ShmPtr};
///
/// let ptr: ShmPtr<[u32; 16]> = ShmOptions::new()
///     .flags(Flags::READ_WRITE | Flags::CREATE | Flags::EXCLUSIVE)
///     .mode(0o640)
///     .open_ptr("/sensor-readings")?;
/// # Ok::<(), shm_ptr::Error>(())
/// ```
#[derive(Clone)]
pub struct ShmOptions {
    flags: Flags,
    offset: u64,
    mode: u32,
    tracer: Arc<dyn AllocationTracer>,
}

impl ShmOptions {
    /// Read-write, create if missing, offset zero, mode `0o600`, no tracing.
    pub fn new() -> Self {
        ShmOptions {
            flags: Flags::OPEN_OR_CREATE,
            offset: 0,
            mode: DEFAULT_MODE,
            tracer: Arc::new(NoopTracer),
        }
    }

    pub fn flags(&mut self, flags: Flags) -> &mut Self {
        self.flags = flags;
        self
    }

    /// Byte offset into the object at which the mapping begins.
    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = offset;
        self
    }

    /// Permission bits for a newly created object. Has no effect when the object exists.
    pub fn mode(&mut self, mode: u32) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Receives an event when an object is opened and when it is dropped.
    pub fn tracer(&mut self, tracer: Arc<dyn AllocationTracer>) -> &mut Self {
        self.tracer = tracer;
        self
    }

    /// Open `name`, mapping `size` bytes.
    pub fn open(&self, name: &str, size: usize) -> Result<NativeShmObject> {
        NativeShmObject::open_with(
            name,
            self.flags,
            size,
            self.offset,
            self.mode,
            self.tracer.clone(),
        )
    }

    /// Open `name` as a pointer to one `T`.
    pub fn open_ptr<T: AnyBitPattern>(&self, name: &str) -> Result<ShmPtr<T>> {
        ShmPtr::from_object(self.open(name, size_of::<T>())?)
    }
}

impl Default for ShmOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ShmOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShmOptions")
            .field("flags", &self.flags)
            .field("offset", &self.offset)
            .field("mode", &format_args!("{:#o}", self.mode))
            .finish_non_exhaustive()
    }
}
