//! Ordered walks over linker-built callback tables.
//!
//! Tables are read-only here. Null slots are holes left by the linker
//! (section padding, the begin/end markers) and are skipped.

use core::ffi::c_int;
use core::num::NonZeroI32;
use core::slice;

use ksrt_abi::{StatusSlot, TableFailure, VoidSlot, table_status};
use ksrt_lib::{KlogLevel, klog_debug, klog_error, klog_is_enabled};

fn report_table<T>(kind: &str, table: &[Option<T>]) {
    if klog_is_enabled(KlogLevel::Debug) == 0 {
        return;
    }
    let populated = table.iter().filter(|slot| slot.is_some()).count();
    klog_debug!("{}: {} of {} slots populated", kind, populated, table.len());
}

/// Call every non-null slot in order. Never stops early.
pub fn run_unconditional(table: &[VoidSlot]) {
    report_table("initterm", table);
    for func in table.iter().flatten() {
        func();
    }
}

/// Call every non-null slot in order, stopping at the first nonzero result.
///
/// Later slots may depend on earlier ones having run, so nothing after a
/// failing slot is called. The failing status is handed back unchanged.
pub fn run_fallible(table: &[StatusSlot]) -> Result<(), TableFailure> {
    report_table("initterm_e", table);
    for (index, slot) in table.iter().enumerate() {
        let Some(func) = slot else {
            continue;
        };
        if let Some(status) = NonZeroI32::new(func()) {
            let failure = TableFailure { index, status };
            klog_error!("initterm_e: {}", failure);
            return Err(failure);
        }
    }
    Ok(())
}

/// View `[first, last)` as a slice. Null or inverted bounds give an empty table.
///
/// # Safety
/// When non-empty, the range must be a single readable array of slots that
/// stays valid for `'a`.
unsafe fn table_from_bounds<'a, T>(first: *const T, last: *const T) -> &'a [T] {
    if first.is_null() || last.is_null() || last <= first {
        return &[];
    }
    // SAFETY: caller guarantees both bounds delimit one array; last > first.
    unsafe {
        let len = last.offset_from(first) as usize;
        slice::from_raw_parts(first, len)
    }
}

/// [`run_unconditional`] over linker boundary markers.
///
/// # Safety
/// `[first, last)` must be a valid, contiguous range of slots.
pub unsafe fn run_unconditional_range(first: *const VoidSlot, last: *const VoidSlot) {
    run_unconditional(unsafe { table_from_bounds(first, last) });
}

/// [`run_fallible`] over linker boundary markers.
///
/// # Safety
/// `[first, last)` must be a valid, contiguous range of slots.
pub unsafe fn run_fallible_range(
    first: *const StatusSlot,
    last: *const StatusSlot,
) -> Result<(), TableFailure> {
    run_fallible(unsafe { table_from_bounds(first, last) })
}

/// [`run_fallible_range`] in the C status convention: `0`, or the failing
/// slot's own result.
///
/// # Safety
/// `[first, last)` must be a valid, contiguous range of slots.
pub unsafe fn run_fallible_status(first: *const StatusSlot, last: *const StatusSlot) -> c_int {
    table_status(unsafe { run_fallible_range(first, last) })
}
