//! ksrt ABI types
//!
//! Plain data shared between the static runtime and its C-side callers:
//! callback slot signatures, status codes, the host version record and the
//! process-wide pool configuration. Everything here is `#[repr(C)]` or
//! `#[repr(transparent)]` so it can cross the boundary unchanged.

#![no_std]
#![forbid(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod error;
pub mod pool;
pub mod slot;
pub mod version;

pub use error::*;
pub use pool::*;
pub use slot::*;
pub use version::*;
