//! Portable access and creation flags.
use core::fmt;

bitflags::bitflags! {
    /// How a shared memory object is opened.
    ///
    /// These serve the same purpose as the `O_*` constants of `fcntl.h` but their bits are our
    /// own. Do not assume they match the numeric values of any system header, only that the
    /// concepts map: `READ_ONLY` means `O_RDONLY` on Unix and whatever is comparable elsewhere.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Flags: u32 {
        /// Open for reading only.
        ///
        /// This is the empty set. Read-only is the absence of `READ_WRITE`.
        const READ_ONLY = 0;
        /// Open for reading and writing.
        const READ_WRITE = 1 << 0;
        /// Create the object if it does not exist.
        const CREATE = 1 << 1;
        /// Together with `CREATE`, fail if the object already exists.
        const EXCLUSIVE = 1 << 2;
        /// If the object exists, truncate it to zero bytes before it is resized.
        const TRUNCATE = 1 << 3;
    }
}

impl Flags {
    /// Open an existing object or create it, for reading and writing.
    pub const OPEN_OR_CREATE: Flags = Flags::READ_WRITE.union(Flags::CREATE);

    /// Whether the mapping will be writable.
    pub const fn is_writable(self) -> bool {
        self.contains(Flags::READ_WRITE)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_writable() {
            f.write_str("READ_ONLY")?;

            if self.is_empty() {
                return Ok(());
            }

            f.write_str(" | ")?;
        }

        bitflags::parser::to_writer(self, f)
    }
}
