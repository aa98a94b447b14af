//! Unmangled entry points for C and C++ objects linked into the image.
//!
//! Only built with the `c-exports` feature: these names collide with the
//! platform libc anywhere one is present. Each symbol forwards to a plain
//! Rust function so the behavior is testable without the symbols.

use core::ffi::c_int;

use ksrt_abi::{
    HostQueryError, HostVersion, StatusCallback, StatusSlot, VoidCallback, VoidSlot, crt_status,
};

use crate::config::{HostVersionQuery, initialize_defaults};
use crate::initterm::{run_fallible_status, run_unconditional_range};
use crate::onexit::{
    self, ChainHandle, NORMAL_EXIT, PROCESS_CHAINS, QUICK_EXIT, drain_handle, register_on_handle,
};

#[repr(C)]
struct RtlOsVersionInfo {
    size: u32,
    major: u32,
    minor: u32,
    build: u32,
    platform_id: u32,
    csd_version: [u16; 128],
}

#[allow(non_snake_case)]
unsafe extern "system" {
    fn RtlGetVersion(info: *mut RtlOsVersionInfo) -> i32;
}

/// Version query backed by the kernel's `RtlGetVersion`.
pub struct RtlVersionQuery;

impl HostVersionQuery for RtlVersionQuery {
    fn host_version(&self) -> Result<HostVersion, HostQueryError> {
        let mut info = RtlOsVersionInfo {
            size: core::mem::size_of::<RtlOsVersionInfo>() as u32,
            major: 0,
            minor: 0,
            build: 0,
            platform_id: 0,
            csd_version: [0; 128],
        };
        let status = unsafe { RtlGetVersion(&mut info) };
        // NTSTATUS success and informational codes are non-negative.
        if status < 0 {
            return Err(HostQueryError(status));
        }
        Ok(HostVersion::new(info.major, info.minor))
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn _initialize_pool() {
    initialize_defaults(&RtlVersionQuery);
}

/// # Safety
/// `[first, last)` must be a valid range of slots.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn _initterm(first: *const VoidSlot, last: *const VoidSlot) {
    unsafe { run_unconditional_range(first, last) }
}

/// # Safety
/// `[first, last)` must be a valid range of slots.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn _initterm_e(first: *const StatusSlot, last: *const StatusSlot) -> c_int {
    unsafe { run_fallible_status(first, last) }
}

#[unsafe(no_mangle)]
pub extern "C" fn atexit(func: Option<VoidCallback>) -> c_int {
    NORMAL_EXIT.register_status(func)
}

#[unsafe(no_mangle)]
pub extern "C" fn at_quick_exit(func: Option<VoidCallback>) -> c_int {
    QUICK_EXIT.register_status(func)
}

#[unsafe(no_mangle)]
pub extern "C" fn onexit(func: Option<StatusCallback>) -> Option<StatusCallback> {
    onexit::onexit(func)
}

#[unsafe(no_mangle)]
pub extern "C" fn _onexit(func: Option<StatusCallback>) -> Option<StatusCallback> {
    onexit::onexit(func)
}

/// Handle of the normal exit chain, for the table-taking entry points.
#[unsafe(no_mangle)]
pub extern "C" fn _onexit_table() -> ChainHandle {
    NORMAL_EXIT.handle()
}

/// Handle of the quick exit chain, for the table-taking entry points.
#[unsafe(no_mangle)]
pub extern "C" fn _quick_onexit_table() -> ChainHandle {
    QUICK_EXIT.handle()
}

/// Register `func` on the chain named by `table`. Unknown tables and null
/// functions fail with `InvalidArgument`.
#[unsafe(no_mangle)]
pub extern "C" fn _register_onexit_function(
    table: ChainHandle,
    func: Option<VoidCallback>,
) -> c_int {
    crt_status(register_on_handle(table, func, &PROCESS_CHAINS))
}

/// Drain the chain named by `table`.
#[unsafe(no_mangle)]
pub extern "C" fn _execute_onexit_table(table: ChainHandle) -> c_int {
    crt_status(drain_handle(table, &PROCESS_CHAINS).map(|_| ()))
}
