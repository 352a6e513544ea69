//! Named shared memory segments, mapped and owned.
//!
//! Processes that agree on a name can share a fixed-size region of memory. This crate opens or
//! creates the region by that name, maps it, and releases the mapping and the name exactly once
//! when the owning value is dropped.
//!
//! - [`ShmPtr<T>`] is the main interface: a move-only pointer to one `T` in shared memory, where
//!   `T` is flat data (see [`bytemuck::AnyBitPattern`]).
//! - [`ShmObject`] is the untyped contract beneath it, implemented on this platform by
//!   [`NativeShmObject`].
//! - [`Flags`] selects read-only or read-write access and the creation behavior.
//!
//! | flags | effect |
//! |---|---|
//! | `READ_ONLY` | open existing only; fail if absent |
//! | `READ_WRITE` | open existing only; fail if absent |
//! | `READ_WRITE \| CREATE` | open or create |
//! | `READ_WRITE \| CREATE \| EXCLUSIVE` | create only; fail if it exists |
//! | any `\| TRUNCATE` | discard existing contents before the object is resized |
//!
//! Names should start with a `/` (added if missing), contain no other `/` and be short. None of
//! that is enforced here beyond the leading slash, the OS decides.
//!
//! There is no synchronization over the shared region. The first handle to be dropped removes
//! the name; any process that opened the name before still shares the memory until it drops its
//! own handle.
mod error;
mod flags;
mod object;
mod options;
#[cfg(unix)]
mod posix;
mod ptr;
pub mod trace;
pub mod tracer;


pub use bytemuck;

pub use error::{Error, ErrorKind, Result};
pub use flags::Flags;
pub use object::{ObjectInfo, ShmObject};
pub use options::ShmOptions;
#[cfg(unix)]
pub use posix::{unlink, PosixShmObject, DEFAULT_MODE};
pub use ptr::ShmPtr;
pub use trace::init_tracing;

#[cfg(not(unix))]
compile_error!("shm-ptr has no shared memory object for this platform");

/// The shared memory object implementation of this platform.
#[cfg(unix)]
pub type NativeShmObject = posix::PosixShmObject;

/// Open or create a native shared memory object.
///
/// See [`PosixShmObject::new`] for the meaning of the arguments and the possible errors.
pub fn make_shm_object(
    name: &str,
    flags: Flags,
    size: usize,
    offset: u64,
) -> Result<NativeShmObject> {
    NativeShmObject::new(name, flags, size, offset)
}
