//! Bring-up and teardown sequencing for one image.
//!
//! Bring-up: pool defaults, then the fallible C initializers (`xi`), then the
//! C++ constructors (`xc`). Teardown: the normal exit chain, then the
//! pre-terminators (`xp`), then the terminators (`xt`). A quick exit drains
//! only the quick chain and skips the terminator tables.

use spin::Once;

use ksrt_abi::{StatusSlot, TableFailure, VoidSlot};
use ksrt_lib::{InitFlag, klog_info, klog_warn};

use crate::config::{HostVersionQuery, initialize_defaults};
use crate::initterm::{run_fallible, run_unconditional};
use crate::onexit::{EntryAlloc, ExitChain, HeapEntryAlloc, NORMAL_EXIT, QUICK_EXIT};

/// The four callback tables the linker builds for an image.
#[derive(Clone, Copy, Default)]
pub struct CrtTables<'a> {
    /// C initializers, fail-fast
    pub xi: &'a [StatusSlot],
    /// C++ constructors
    pub xc: &'a [VoidSlot],
    /// Pre-terminators
    pub xp: &'a [VoidSlot],
    /// Terminators
    pub xt: &'a [VoidSlot],
}

pub struct CrtImage<'a, A: EntryAlloc = HeapEntryAlloc> {
    tables: CrtTables<'a>,
    normal: &'a ExitChain<A>,
    quick: &'a ExitChain<A>,
    startup: Once<Result<(), TableFailure>>,
    stopped: InitFlag,
}

impl<'a> CrtImage<'a> {
    /// An image wired to the process-wide exit chains.
    pub fn new(tables: CrtTables<'a>) -> Self {
        Self::with_chains(tables, &NORMAL_EXIT, &QUICK_EXIT)
    }
}

impl<'a, A: EntryAlloc> CrtImage<'a, A> {
    pub fn with_chains(
        tables: CrtTables<'a>,
        normal: &'a ExitChain<A>,
        quick: &'a ExitChain<A>,
    ) -> Self {
        Self {
            tables,
            normal,
            quick,
            startup: Once::new(),
            stopped: InitFlag::new(),
        }
    }

    /// Run bring-up once. Later calls return the first outcome without
    /// running anything.
    pub fn startup(&self, host: &dyn HostVersionQuery) -> Result<(), TableFailure> {
        if let Some(outcome) = self.startup.get() {
            klog_warn!("crt: startup already ran");
            return *outcome;
        }
        *self.startup.call_once(|| self.run_startup(host))
    }

    fn run_startup(&self, host: &dyn HostVersionQuery) -> Result<(), TableFailure> {
        klog_info!("crt: startup");
        initialize_defaults(host);
        run_fallible(self.tables.xi)?;
        run_unconditional(self.tables.xc);
        klog_info!("crt: startup complete");
        Ok(())
    }

    /// Whether startup ran to completion.
    pub fn is_started(&self) -> bool {
        matches!(self.startup.get(), Some(Ok(())))
    }

    /// Normal teardown. Returns `false` when skipped: startup never
    /// succeeded, or teardown already happened.
    pub fn shutdown(&self) -> bool {
        if !self.is_started() || !self.stopped.init_once() {
            return false;
        }
        klog_info!("crt: shutdown");
        self.normal.drain();
        run_unconditional(self.tables.xp);
        run_unconditional(self.tables.xt);
        true
    }

    /// Quick-exit teardown: only the quick chain runs.
    pub fn quick_shutdown(&self) -> bool {
        if !self.is_started() || !self.stopped.init_once() {
            return false;
        }
        klog_info!("crt: quick shutdown");
        self.quick.drain();
        true
    }
}
