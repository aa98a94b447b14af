//! Static initialization and teardown support for hosts with no C runtime.
//!
//! - [`config`]: version-gated pool defaults applied during bring-up
//! - [`initterm`]: ordered walks over linker-built callback tables
//! - [`onexit`]: the normal and quick exit-handler chains
//! - [`lifecycle`]: sequencing of the above for one image
//!
//! Everything here expects to run on a single thread at well-defined
//! bring-up and teardown points. The exit chains lock their heads anyway, so
//! concurrent registration cannot lose entries.

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod config;
pub mod initterm;
pub mod lifecycle;
pub mod onexit;

#[cfg(feature = "c-exports")]
pub mod exports;

#[cfg(test)]
mod test_support;

pub use config::{
    HostVersionQuery, PoolDefaults, defaults_initialized, initialize_defaults, pool_defaults,
};
pub use initterm::{
    run_fallible, run_fallible_range, run_fallible_status, run_unconditional,
    run_unconditional_range,
};
pub use lifecycle::{CrtImage, CrtTables};
pub use onexit::{
    ChainHandle, EntryAlloc, ExitChain, ExitHandler, HeapEntryAlloc, NORMAL_EXIT,
    PROCESS_CHAINS, QUICK_EXIT, at_quick_exit, atexit, chain_from_handle, drain_handle, onexit,
    register_on_handle,
};
