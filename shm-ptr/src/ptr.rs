//! A typed, move-only pointer into a named shared memory object.
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::mem::{align_of, size_of};
use core::ops::{Deref, DerefMut};
use core::{fmt, mem, ptr};

use bytemuck::AnyBitPattern;

use crate::object::{ObjectInfo, ShmObject};
use crate::{make_shm_object, Flags, NativeShmObject, Result};

const TAG: &str = "shm_ptr";

/// Owns a shared memory object holding exactly one `T`.
///
/// The mapping is always `size_of::<T>()` bytes long, whatever the caller asked for elsewhere.
/// `T` must be [`AnyBitPattern`]: flat, `Copy` data for which every byte sequence is a valid
/// value. Shared memory has no object model. Another process may write any bytes at any time and
/// a freshly created object is all zeros, so nothing else could be read back soundly.
///
/// The pointer is either empty or owns one object. It is not `Clone`, ownership of the object
/// moves with the value and [`take`](Self::take) leaves an empty pointer behind. Dropping a
/// non-empty pointer drops the object, which unmaps it and unlinks its name.
///
/// No synchronization is provided. Concurrent modification from several processes must be
/// coordinated by the caller; [`load`](Self::load) and [`store`](Self::store) at least keep the
/// compiler from caching values that another process changes.
///
/// ```no_run
/// use shm_ptr::{Flags, ShmPtr};
///
/// #[derive(Clone, Copy, bytemuck::AnyBitPattern)]
/// #[repr(C)]
/// struct Counter {
///     value: u64,
/// }
///
/// let mut counter = ShmPtr::<Counter>::new("/my-counter")?;
/// counter.value += 1;
///
/// let observer = ShmPtr::<Counter>::with_flags("/my-counter", Flags::READ_ONLY)?;
/// assert_eq!(observer.load().value, counter.value);
/// # Ok::<(), shm_ptr::Error>(())
/// ```
pub struct ShmPtr<T: AnyBitPattern> {
    object: Option<NativeShmObject>,
    _element: PhantomData<T>,
}

impl<T: AnyBitPattern> ShmPtr<T> {
    /// A pointer that owns nothing.
    pub const fn null() -> Self {
        ShmPtr {
            object: None,
            _element: PhantomData,
        }
    }

    /// Open or create `name` for reading and writing.
    pub fn new(name: &str) -> Result<Self> {
        Self::with_offset(name, Flags::OPEN_OR_CREATE, 0)
    }

    /// Open `name` with `flags`, mapping from the start of the object.
    ///
    /// With `READ_WRITE` the object is resized to `size_of::<T>()`. Opening a name that others
    /// map with a larger type shrinks it under them, see [`PosixShmObject`](crate::PosixShmObject).
    pub fn with_flags(name: &str, flags: Flags) -> Result<Self> {
        Self::with_offset(name, flags, 0)
    }

    /// Open `name` with `flags`, mapping `size_of::<T>()` bytes from `offset`.
    ///
    /// Fails like [`PosixShmObject::new`](crate::PosixShmObject::new), and additionally with
    /// `InvalidArgument` if the resulting address is not aligned for `T`.
    pub fn with_offset(name: &str, flags: Flags, offset: u64) -> Result<Self> {
        Self::from_object(make_shm_object(name, flags, size_of::<T>(), offset)?)
    }

    /// Take ownership of an already opened object.
    ///
    /// The object must map exactly `size_of::<T>()` bytes at an address aligned for `T`,
    /// otherwise it is dropped and `InvalidArgument` returned.
    pub fn from_object(object: NativeShmObject) -> Result<Self> {
        if object.size() != size_of::<T>() {
            return Err(ObjectInfo::invalid_argument(
                TAG,
                "object length differs from the element size",
            ));
        }

        if object.get() as usize % align_of::<T>() != 0 {
            return Err(ObjectInfo::invalid_argument(
                TAG,
                "mapped address is not aligned for the element type",
            ));
        }

        Ok(ShmPtr {
            object: Some(object),
            _element: PhantomData,
        })
    }

    /// The mapped element, or null for an empty pointer.
    pub fn get(&self) -> *mut T {
        self.object
            .as_ref()
            .map_or(ptr::null_mut(), |object| object.get().cast())
    }

    pub fn is_some(&self) -> bool {
        !self.get().is_null()
    }

    pub fn is_none(&self) -> bool {
        self.get().is_null()
    }

    /// Whether the element can be modified through this pointer.
    pub fn is_writable(&self) -> bool {
        self.object
            .as_ref()
            .map_or(false, |object| object.flags().is_writable())
    }

    pub fn object(&self) -> Option<&NativeShmObject> {
        self.object.as_ref()
    }

    /// Give up the typed view and return the owned object.
    pub fn into_object(self) -> Option<NativeShmObject> {
        self.object
    }

    /// Move the object out, leaving this pointer empty.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Drop the owned object, if any, and become empty.
    pub fn reset(&mut self) {
        self.object = None;
    }

    /// Exchange the owned objects of two pointers.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other)
    }

    pub fn as_ref(&self) -> Option<&T> {
        // Safety: a non-null address maps `size_of::<T>()` bytes, aligned for `T`, for as long
        // as `self` owns the object. Any bytes are a valid `T`.
        unsafe { self.get().as_ref() }
    }

    /// The element, if this pointer is non-empty and writable.
    pub fn as_mut(&mut self) -> Option<&mut T> {
        if !self.is_writable() {
            return None;
        }

        // Safety: as in `as_ref`, and the mapping is `PROT_WRITE`.
        unsafe { self.get().as_mut() }
    }

    /// Copy the element out with a volatile read.
    ///
    /// Use this to poll a value that another process modifies.
    ///
    /// # Panics
    ///
    /// If the pointer is empty.
    pub fn load(&self) -> T {
        let element = self.element_ptr();
        // Safety: see `as_ref`.
        unsafe { ptr::read_volatile(element) }
    }

    /// Overwrite the element with a volatile write.
    ///
    /// # Panics
    ///
    /// If the pointer is empty or the mapping is read-only.
    pub fn store(&mut self, value: T) {
        let element = self.writable_element_ptr();
        // Safety: see `as_mut`.
        unsafe { ptr::write_volatile(element, value) }
    }

    /// Borrow the start of the mapping as another type.
    ///
    /// Returns `None` if the pointer is empty, `U` is larger than `T`, or the address is not
    /// aligned for `U`. The view can not outlive this pointer and never owns the mapping.
    pub fn view<U: AnyBitPattern>(&self) -> Option<&U> {
        let element = self.view_ptr::<U>()?;
        // Safety: `view_ptr` checked length and alignment. Any bytes are a valid `U`.
        Some(unsafe { &*element })
    }

    /// Mutably borrow the start of the mapping as another type.
    ///
    /// Like [`Self::view`], and `None` for a read-only mapping as well.
    pub fn view_mut<U: AnyBitPattern>(&mut self) -> Option<&mut U> {
        if !self.is_writable() {
            return None;
        }

        let element = self.view_ptr::<U>()?;
        // Safety: as in `view`, and the mapping is `PROT_WRITE`.
        Some(unsafe { &mut *element })
    }

    fn view_ptr<U: AnyBitPattern>(&self) -> Option<*mut U> {
        let element = self.get();

        if element.is_null()
            || size_of::<U>() > size_of::<T>()
            || element as usize % align_of::<U>() != 0
        {
            return None;
        }

        Some(element.cast())
    }

    fn element_ptr(&self) -> *mut T {
        let element = self.get();
        if element.is_null() {
            panic!("dereferenced an empty ShmPtr");
        }
        element
    }

    fn writable_element_ptr(&mut self) -> *mut T {
        let element = self.element_ptr();
        if !self.is_writable() {
            panic!("ShmPtr to a read-only mapping can not be modified");
        }
        element
    }
}

impl<T: AnyBitPattern> Default for ShmPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

/// # Panics
///
/// Dereferencing an empty pointer panics. Check [`ShmPtr::is_some`] or use [`ShmPtr::as_ref`].
impl<T: AnyBitPattern> Deref for ShmPtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        let element = self.element_ptr();
        // Safety: see `as_ref`.
        unsafe { &*element }
    }
}

/// # Panics
///
/// Panics for an empty pointer and for a read-only mapping.
impl<T: AnyBitPattern> DerefMut for ShmPtr<T> {
    fn deref_mut(&mut self) -> &mut T {
        let element = self.writable_element_ptr();
        // Safety: see `as_mut`.
        unsafe { &mut *element }
    }
}

/// Pointers are equal when they map the same address, i.e. by identity and not by content.
impl<T: AnyBitPattern> PartialEq for ShmPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl<T: AnyBitPattern> Eq for ShmPtr<T> {}

/// Hashes the mapped address, consistent with `Eq`.
impl<T: AnyBitPattern> Hash for ShmPtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.get().hash(state)
    }
}

impl<T: AnyBitPattern> fmt::Pointer for ShmPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.get(), f)
    }
}

impl<T: AnyBitPattern> fmt::Debug for ShmPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShmPtr")
            .field("name", &self.object.as_ref().map(|object| object.name()))
            .field("address", &self.get())
            .finish()
    }
}
