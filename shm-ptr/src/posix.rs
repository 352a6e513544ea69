//! Shared memory objects on top of `shm_open` and `mmap`.
use core::ffi::c_int;
use core::{fmt, ptr};
use std::ffi::{CStr, CString};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::sync::Arc;

use memmap2::{MmapOptions, MmapRaw};

use crate::object::{ObjectInfo, ShmObject};
use crate::trace::{debug, warn};
use crate::tracer::{AllocationTracer, NoopTracer};
use crate::{Flags, Result};

const TAG: &str = "posix_shm_object";

/// Permission bits of newly created objects, unless configured otherwise.
pub const DEFAULT_MODE: u32 = 0o600;

/// A POSIX shared memory object, open and mapped.
///
/// Construction opens (or creates) the object with `shm_open`, sizes it with `ftruncate` when
/// opened for writing, and maps it with `mmap`. Dropping it unmaps the region, calls
/// `shm_unlink` on the name and closes the descriptor, in that order.
///
/// Every drop unlinks. Other processes, or other objects in this process, that opened the name
/// before keep their mapping: the OS frees the memory once the last of them is gone. Opening the
/// name after the unlink creates a new, unrelated object.
///
/// A writable open always resizes the object to `offset + size`, including when that shrinks
/// it. Any mapping of the same name that extends past the new end, in this or another process,
/// then raises `SIGBUS` when it touches those pages. All writable openers of a name should agree
/// on the window they map.
pub struct PosixShmObject {
    info: ObjectInfo,
    c_name: CString,
    /// Must be unmapped before `fd` is closed, and before the name is unlinked.
    mapping: Option<MmapRaw>,
    fd: OwnedFd,
    tracer: Arc<dyn AllocationTracer>,
}

impl PosixShmObject {
    /// Open or create the object `name` and map `size` bytes of it, starting at `offset`.
    ///
    /// A missing leading `/` is added to `name`. Newly created objects get the permission bits
    /// [`DEFAULT_MODE`]; use [`ShmOptions`](crate::ShmOptions) for other modes.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `name` is empty or contains a nul byte, or `size` is zero.
    /// - `Resource` if any of `shm_open`, `ftruncate` or `mmap` fails, for instance because
    ///   `EXCLUSIVE` was given and the name exists, or `CREATE` was not given and it does not.
    pub fn new(name: &str, flags: Flags, size: usize, offset: u64) -> Result<Self> {
        Self::open_with(name, flags, size, offset, DEFAULT_MODE, Arc::new(NoopTracer))
    }

    pub(crate) fn open_with(
        name: &str,
        flags: Flags,
        size: usize,
        offset: u64,
        mode: u32,
        tracer: Arc<dyn AllocationTracer>,
    ) -> Result<Self> {
        let name = normalize_name(name)?;
        let c_name = CString::new(name.as_bytes()).map_err(|_| {
            ObjectInfo::invalid_argument(TAG, "shared memory object name contains a nul byte")
        })?;

        if size == 0 {
            return Err(ObjectInfo::invalid_argument(
                TAG,
                "shared memory mapping requires a non-zero length",
            ));
        }

        let info = ObjectInfo::new(TAG, name, flags, size, offset);
        let oflag = to_open_flags(flags);

        let fd = shm_open(&c_name, oflag, mode as libc::mode_t)
            .map_err(|err| info.resource_error("shm_open", err))?;

        debug!(name = info.name(), %flags, "opened shared memory object");
        tracer.allocated(info.name());

        // From here on a failure drops `object`, which closes the descriptor and unlinks.
        let mut object = PosixShmObject {
            info,
            c_name,
            mapping: None,
            fd,
            tracer,
        };

        if oflag & libc::O_RDWR != 0 {
            object.resize()?;
        }

        object.map()?;
        Ok(object)
    }

    /// Size the backing object so that the whole mapped window is backed.
    fn resize(&mut self) -> Result<()> {
        let len = self
            .info
            .offset()
            .checked_add(self.info.size() as u64)
            .and_then(|end| libc::off_t::try_from(end).ok())
            .ok_or_else(|| {
                ObjectInfo::invalid_argument(TAG, "offset and length exceed the object size limit")
            })?;

        if -1 == unsafe { libc::ftruncate(self.raw_fd(), len) } {
            return Err(self.info.last_os_error("ftruncate"));
        }

        Ok(())
    }

    fn map(&mut self) -> Result<()> {
        let mut options = MmapOptions::new();
        options.offset(self.info.offset()).len(self.info.size());

        // `map_raw` is `PROT_READ | PROT_WRITE`, `map_raw_read_only` is `PROT_READ`. Both are
        // `MAP_SHARED`. An offset that is not page aligned is aligned down by memmap2, the
        // returned pointer still points at `offset`.
        let mapping = if self.info.flags().is_writable() {
            options.map_raw(&self.fd)
        } else {
            options.map_raw_read_only(&self.fd)
        };

        let mapping = mapping.map_err(|err| self.info.resource_error("mmap", err))?;
        self.tracer.note("mmap() returned", mapping.as_ptr());
        self.mapping = Some(mapping);

        Ok(())
    }

    fn raw_fd(&self) -> c_int {
        self.fd.as_raw_fd()
    }
}

impl ShmObject for PosixShmObject {
    fn info(&self) -> &ObjectInfo {
        &self.info
    }

    fn get(&self) -> *mut u8 {
        self.mapping
            .as_ref()
            .map_or(ptr::null_mut(), MmapRaw::as_mut_ptr)
    }
}

impl Drop for PosixShmObject {
    fn drop(&mut self) {
        if let Some(mapping) = self.mapping.take() {
            self.tracer.note("munmap()", mapping.as_ptr());
            drop(mapping);
        }

        if -1 == unsafe { libc::shm_unlink(self.c_name.as_ptr()) } {
            let err = io::Error::last_os_error();

            // Someone else dropped their handle to this name first.
            if err.raw_os_error() == Some(libc::ENOENT) {
                debug!(name = self.info.name(), "shared memory object already unlinked");
            } else {
                warn!(name = self.info.name(), %err, "shm_unlink() failed");
            }
        }

        self.tracer.deallocated(self.info.name());
    }
}

impl fmt::Debug for PosixShmObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PosixShmObject")
            .field("info", &self.info)
            .field("fd", &self.fd)
            .field("address", &self.get())
            .finish()
    }
}

/// Remove `name` from the shared memory namespace.
///
/// Useful to clean up a name left behind by a process that crashed before dropping its objects.
/// Existing mappings of the name stay valid.
pub fn unlink(name: &str) -> Result<()> {
    let name = normalize_name(name)?;
    let c_name = CString::new(name.as_bytes()).map_err(|_| {
        ObjectInfo::invalid_argument(TAG, "shared memory object name contains a nul byte")
    })?;

    if -1 == unsafe { libc::shm_unlink(c_name.as_ptr()) } {
        let info = ObjectInfo::new(TAG, name, Flags::READ_ONLY, 0, 0);
        return Err(info.last_os_error("shm_unlink"));
    }

    Ok(())
}

/// POSIX names start with a single `/`.
pub(crate) fn normalize_name(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(ObjectInfo::invalid_argument(
            TAG,
            "shared memory object requires a name",
        ));
    }

    if name.starts_with('/') {
        Ok(name.to_owned())
    } else {
        Ok(format!("/{name}"))
    }
}

/// Translate portable flags to `fcntl.h` open flags.
///
/// Nothing is implied: a flag is set exactly when its portable counterpart is.
pub(crate) fn to_open_flags(flags: Flags) -> c_int {
    let mut oflag = libc::O_RDONLY;

    if flags.contains(Flags::CREATE) {
        oflag |= libc::O_CREAT;
    }
    if flags.contains(Flags::READ_WRITE) {
        oflag |= libc::O_RDWR;
    }
    if flags.contains(Flags::EXCLUSIVE) {
        oflag |= libc::O_EXCL;
    }
    if flags.contains(Flags::TRUNCATE) {
        oflag |= libc::O_TRUNC;
    }

    oflag
}

fn shm_open(name: &CStr, oflag: c_int, mode: libc::mode_t) -> io::Result<OwnedFd> {
    #[cfg(not(target_vendor = "apple"))]
    let fd = unsafe { libc::shm_open(name.as_ptr(), oflag, mode) };
    // Variadic on these platforms, the mode is promoted.
    #[cfg(target_vendor = "apple")]
    let fd = unsafe { libc::shm_open(name.as_ptr(), oflag, libc::c_uint::from(mode)) };

    if fd == -1 {
        return Err(io::Error::last_os_error());
    }

    // Safety: a fresh descriptor, owned by nothing else.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}
