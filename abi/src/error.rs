//! Status codes returned across the runtime boundary

use core::ffi::c_int;
use core::fmt;
use core::num::NonZeroI32;

/// Implement common methods for runtime error enums.
///
/// Generates `as_c_int()`, `from_c_int()`, `is_success()`, and `is_error()`
/// for `#[repr(i32)]` enums where `0` means success.
macro_rules! impl_crt_error {
    ($ty:ty, fallback: $fallback:ident, variants: { $($val:literal => $variant:ident),* $(,)? }) => {
        impl $ty {
            /// Convert to the C status convention.
            #[inline]
            pub fn as_c_int(self) -> c_int {
                self as c_int
            }

            /// Convert from the C status convention.
            #[inline]
            pub fn from_c_int(val: c_int) -> Self {
                match val {
                    $($val => Self::$variant,)*
                    _ => Self::$fallback,
                }
            }

            #[inline]
            pub fn is_success(self) -> bool {
                matches!(self, Self::Success)
            }

            #[inline]
            pub fn is_error(self) -> bool {
                !self.is_success()
            }
        }
    };
}

/// Result type for registry operations.
pub type CrtResult<T> = Result<T, CrtError>;

/// Errors reported by exit-handler registration.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrtError {
    #[default]
    Success = 0,
    /// The entry allocator could not provide a node
    OutOfMemory = -1,
    /// A null handler was passed in
    InvalidArgument = -2,
}

impl_crt_error!(CrtError, fallback: InvalidArgument, variants: {
    0 => Success,
    -1 => OutOfMemory,
    -2 => InvalidArgument,
});

impl fmt::Display for CrtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Success => "success",
            Self::OutOfMemory => "exit entry allocation failed",
            Self::InvalidArgument => "null exit handler",
        };
        f.write_str(text)
    }
}

/// Flatten a registry result into the C status convention.
#[inline]
pub fn crt_status(result: CrtResult<()>) -> c_int {
    match result {
        Ok(()) => 0,
        Err(err) => err.as_c_int(),
    }
}

/// Flatten a fallible table run into the C status convention: `0`, or the
/// failing slot's result unchanged.
#[inline]
pub fn table_status(result: Result<(), TableFailure>) -> c_int {
    match result {
        Ok(()) => 0,
        Err(failure) => failure.as_c_int(),
    }
}

/// A fallible initializer returned nonzero and stopped its table.
///
/// `status` is passed through untouched; the runtime never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableFailure {
    /// Position of the failing slot within its table
    pub index: usize,
    pub status: NonZeroI32,
}

impl TableFailure {
    #[inline]
    pub fn as_c_int(self) -> c_int {
        self.status.get()
    }
}

impl fmt::Display for TableFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "initializer #{} returned {}", self.index, self.status)
    }
}
