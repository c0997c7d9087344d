use std::io;

/// Errors reported by the allocator.
pub enum Error {
    /// The file or buffer is not a well-formed TideDB database. The payload
    /// names the specific check that failed.
    InvalidDatabase(&'static str),
    /// Free-space tracking was lost due to out-of-memory; allocation is
    /// refused until [`crate::SlabAlloc::reset_free_space_tracking`] runs.
    InvalidFreeSpace,
    /// A slab buffer or free-list entry could not be allocated.
    OutOfMemory,
    /// An underlying file or mapping operation failed.
    Io(io::Error),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidDatabase(reason) => write!(f, "invalid database: {reason}"),
            Self::InvalidFreeSpace => {
                write!(f, "free space tracking was lost due to out-of-memory")
            }
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::Io(err) => write!(f, "i/o error: {err}"),
        }
    }
}

impl core::fmt::Debug for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidDatabase(reason) => f.debug_tuple("InvalidDatabase").field(reason).finish(),
            Self::InvalidFreeSpace => write!(f, "InvalidFreeSpace"),
            Self::OutOfMemory => write!(f, "OutOfMemory"),
            Self::Io(err) => f.debug_tuple("Io").field(err).finish(),
        }
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<nix::errno::Errno> for Error {
    fn from(errno: nix::errno::Errno) -> Self {
        Self::Io(io::Error::from_raw_os_error(errno as i32))
    }
}
