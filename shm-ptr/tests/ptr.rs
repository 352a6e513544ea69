#![cfg(target_family = "unix")]
mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{unique_name, TestStruct, MESSAGE};
use shm_ptr::tracer::{AllocationTracer, CountingTracer};
use shm_ptr::{make_shm_object, ErrorKind, Flags, ShmObject, ShmOptions, ShmPtr};

#[test]
fn default_is_empty() {
    let ptr = ShmPtr::<TestStruct>::default();
    assert!(ptr.is_none());
    assert!(ptr.get().is_null());
    assert_eq!(format!("{ptr:p}"), format!("{:p}", core::ptr::null::<TestStruct>()));
}

#[test]
fn create_and_modify() {
    let name = unique_name("create_and_modify");
    let mut ptr = ShmPtr::<i32>::new(&name).unwrap();

    assert!(ptr.is_some());
    assert!(ptr.is_writable());
    assert_eq!(*ptr, 0);

    *ptr = 7;
    assert_eq!(*ptr, 7);
    assert_eq!(ptr.load(), 7);

    let object = ptr.object().unwrap();
    assert_eq!(object.name(), name);
    assert_eq!(object.size(), core::mem::size_of::<i32>());
}

#[test]
fn take_moves_ownership() {
    let name = unique_name("take_moves_ownership");
    let mut source = ShmPtr::<u64>::new(&name).unwrap();
    let address = source.get();

    let target = source.take();
    assert!(source.is_none());
    assert_eq!(target.get(), address);

    // Moving a value does not remap either.
    let moved = target;
    assert_eq!(moved.get(), address);

    let object = moved.into_object().unwrap();
    assert_eq!(object.get().cast::<u64>(), address);
}

#[test]
fn swap_exchanges_objects() {
    let mut first = ShmPtr::<u32>::new(&unique_name("swap_first")).unwrap();
    let mut second = ShmPtr::<u32>::null();
    let address = first.get();

    first.swap(&mut second);
    assert!(first.is_none());
    assert_eq!(second.get(), address);

    let mut third = ShmPtr::<u32>::new(&unique_name("swap_third")).unwrap();
    let other = third.get();
    second.swap(&mut third);
    assert_eq!(second.get(), other);
    assert_eq!(third.get(), address);
}

#[test]
fn reset_releases_the_name() {
    let name = unique_name("reset_releases_the_name");
    let mut ptr = ShmPtr::<u32>::new(&name).unwrap();

    ptr.reset();
    assert!(ptr.is_none());

    let err = ShmPtr::<u32>::with_flags(&name, Flags::READ_ONLY).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
}

#[test]
fn identity_hashing() {
    let first = ShmPtr::<u32>::new(&unique_name("identity_first")).unwrap();
    let second = ShmPtr::<u32>::new(&unique_name("identity_second")).unwrap();
    assert_ne!(first, second);

    let mut set = HashSet::new();
    assert!(set.insert(first));
    assert!(set.insert(second));
    assert!(set.insert(ShmPtr::null()));
    assert!(!set.insert(ShmPtr::null()));
    assert_eq!(set.len(), 3);
}

#[test]
fn shared_between_handles() {
    let name = unique_name("shared_between_handles");
    let mut writer = ShmPtr::<TestStruct>::new(&name).unwrap();
    let mut reader = ShmPtr::<TestStruct>::with_flags(&name, Flags::READ_ONLY).unwrap();

    assert!(!reader.is_writable());
    assert!(reader.as_mut().is_none());
    assert_ne!(writer, reader);

    let mut value = writer.load();
    value.number = 42;
    value.real = 1.5;
    value.true_or_false = 1;
    value.set_text(MESSAGE);
    writer.store(value);

    let seen = reader.load();
    assert_eq!(seen, value);
    assert_eq!(seen.text(), MESSAGE);
    assert_eq!(reader.as_ref().map(|v| v.number), Some(42));
}

#[test]
#[should_panic(expected = "read-only")]
fn read_only_deref_mut_panics() {
    let name = unique_name("read_only_deref_mut_panics");
    let _owner = ShmPtr::<u32>::new(&name).unwrap();
    let mut reader = ShmPtr::<u32>::with_flags(&name, Flags::READ_ONLY).unwrap();
    *reader = 1;
}

#[test]
fn views() {
    let name = unique_name("views");
    let mut ptr = ShmPtr::<[u32; 4]>::new(&name).unwrap();

    *ptr.view_mut::<u32>().unwrap() = 0x0102_0304;
    assert_eq!(ptr[0], 0x0102_0304);
    assert_eq!(ptr.view::<[u16; 2]>().map(|v| v.len()), Some(2));

    // Larger than the element.
    assert!(ptr.view::<[u32; 8]>().is_none());

    let reader = ShmPtr::<[u32; 4]>::with_flags(&name, Flags::READ_ONLY).unwrap();
    assert_eq!(reader.view::<u32>(), Some(&0x0102_0304));
}

#[test]
fn struct_at_offset() {
    #[derive(Clone, Copy, Debug, PartialEq, bytemuck::AnyBitPattern)]
    #[repr(C)]
    struct Fields {
        a: u32,
        b: u32,
        c: u32,
        d: u32,
        e: u32,
    }

    let name = unique_name("struct_at_offset");
    let flags = Flags::READ_WRITE | Flags::CREATE | Flags::EXCLUSIVE;
    let mut ptr = ShmPtr::<Fields>::with_offset(&name, flags, 20).unwrap();

    let object = ptr.object().unwrap();
    assert_eq!(object.offset(), 20);
    assert_eq!(object.size(), 20);
    assert_eq!(object.flags(), flags);
    assert_eq!(*ptr, Fields { a: 0, b: 0, c: 0, d: 0, e: 0 });

    ptr.c = 3;
    let whole = make_shm_object(&name, Flags::READ_ONLY, 40, 0).unwrap();
    let c = unsafe { whole.get().add(28).cast::<u32>().read_volatile() };
    assert_eq!(c, 3);
}

#[test]
fn misaligned_offset_is_rejected() {
    let name = unique_name("misaligned_offset_is_rejected");
    let err = ShmPtr::<u32>::with_offset(&name, Flags::OPEN_OR_CREATE, 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // Bytes have no alignment requirement.
    let ptr = ShmPtr::<[u8; 3]>::with_offset(&name, Flags::OPEN_OR_CREATE, 1).unwrap();
    assert!(ptr.is_some());
}

#[test]
fn object_of_wrong_size_is_rejected() {
    let name = unique_name("object_of_wrong_size_is_rejected");
    let object = make_shm_object(&name, Flags::OPEN_OR_CREATE, 2, 0).unwrap();

    let err = ShmPtr::<u32>::from_object(object).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn options_open_pointer() {
    let name = unique_name("options_open_pointer");
    let mut options = ShmOptions::new();
    options
        .flags(Flags::READ_WRITE | Flags::CREATE | Flags::EXCLUSIVE)
        .mode(0o640);
    assert!(format!("{options:?}").contains("0o640"));

    let ptr = options.open_ptr::<u64>(&name).unwrap();
    assert!(ptr.is_writable());

    let err = options.open_ptr::<u64>(&name).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EEXIST));
}

#[test]
fn tracer_balances() {
    let name = unique_name("tracer_balances");
    let tracer = Arc::new(CountingTracer::new("ptr-tests"));

    let mut options = ShmOptions::new();
    options.tracer(tracer.clone());

    let first = options.open_ptr::<u32>(&name).unwrap();
    let second = options.open_ptr::<u32>(&name).unwrap();
    assert_eq!(tracer.count(&name), 2);

    drop(first);
    assert_eq!(tracer.count(&name), 1);
    drop(second);
    assert_eq!(tracer.count(&name), 0);

    // A failed open is not an allocation.
    options.flags(Flags::READ_ONLY);
    assert!(options.open_ptr::<u32>(&name).is_err());
    assert_eq!(tracer.count(&name), 0);

    let report = tracer.report();
    assert!(report.starts_with("allocation tracer report: tag: ptr-tests records: 1\n"));
    assert!(report.contains(&format!("\t{name}: count: 0\n")), "{report}");
}
