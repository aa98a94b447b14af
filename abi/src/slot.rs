//! Callback slot signatures.
//!
//! `Option<extern "C" fn ..>` has the same layout as a nullable C function
//! pointer, so linker-built tables can be viewed directly as slices of these.

use core::ffi::c_int;

/// Constructor/terminator slot: no arguments, no result.
pub type VoidCallback = extern "C" fn();

/// Fallible initializer slot: `0` on success, anything else aborts the table.
pub type StatusCallback = extern "C" fn() -> c_int;

/// Table entry for [`VoidCallback`] tables. `None` slots are skipped.
pub type VoidSlot = Option<VoidCallback>;

/// Table entry for [`StatusCallback`] tables. `None` slots are skipped.
pub type StatusSlot = Option<StatusCallback>;
