//! Exit-handler chains.
//!
//! A chain is a singly linked LIFO of teardown callbacks: registration links a
//! new node in front of the head, [`ExitChain::drain`] runs and frees the nodes
//! head to tail, so the newest handler runs first. The process keeps two
//! independent chains, [`NORMAL_EXIT`] for `atexit` and [`QUICK_EXIT`] for
//! `at_quick_exit`; they never share nodes.
//!
//! Handlers must not register on the chain that is currently draining. The
//! drain detaches the whole list before running anything, so such a handler
//! lands on the fresh chain and only runs on the next drain.

use core::alloc::Layout;
use core::ffi::{c_int, c_void};
use core::ptr::{self, NonNull};

use spin::Mutex;

use ksrt_abi::{CrtError, CrtResult, StatusCallback, VoidCallback, crt_status};
use ksrt_lib::{klog_debug, klog_warn};

/// A deferred teardown callback.
#[derive(Clone, Copy, Debug)]
pub enum ExitHandler {
    /// `atexit`/`at_quick_exit` style
    Plain(VoidCallback),
    /// `onexit` style; the returned status is ignored
    Status(StatusCallback),
}

impl ExitHandler {
    #[inline]
    fn invoke(self) {
        match self {
            ExitHandler::Plain(func) => func(),
            ExitHandler::Status(func) => {
                let _ = func();
            }
        }
    }
}

/// Single-object allocator for chain nodes.
pub trait EntryAlloc {
    /// Returns `None` when no memory is available.
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// # Safety
    /// `ptr` must come from [`EntryAlloc::allocate`] on `self` with `layout`,
    /// and must not be used afterwards.
    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout);
}

/// Nodes from the global allocator.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeapEntryAlloc;

impl EntryAlloc for HeapEntryAlloc {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.size() == 0 {
            return None;
        }
        // SAFETY: non-zero size checked above.
        NonNull::new(unsafe { alloc::alloc::alloc(layout) })
    }

    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

struct ExitEntry {
    next: Option<NonNull<ExitEntry>>,
    handler: ExitHandler,
}

const ENTRY_LAYOUT: Layout = Layout::new::<ExitEntry>();

struct ChainHead(Option<NonNull<ExitEntry>>);

// SAFETY: nodes are only reached through the head, which the chain's mutex
// guards; a node is owned by exactly one chain.
unsafe impl Send for ChainHead {}

pub struct ExitChain<A: EntryAlloc = HeapEntryAlloc> {
    name: &'static str,
    head: Mutex<ChainHead>,
    alloc: A,
}

impl ExitChain<HeapEntryAlloc> {
    pub const fn new(name: &'static str) -> Self {
        Self::with_allocator(name, HeapEntryAlloc)
    }
}

impl<A: EntryAlloc> ExitChain<A> {
    pub const fn with_allocator(name: &'static str, alloc: A) -> Self {
        Self {
            name,
            head: Mutex::new(ChainHead(None)),
            alloc,
        }
    }

    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    pub fn is_empty(&self) -> bool {
        self.head.lock().0.is_none()
    }

    pub fn len(&self) -> usize {
        let head = self.head.lock();
        let mut count = 0;
        let mut cursor = head.0;
        while let Some(entry) = cursor {
            count += 1;
            // SAFETY: linked nodes stay alive while the head lock is held.
            cursor = unsafe { entry.as_ref().next };
        }
        count
    }

    /// Push `handler` so it runs before everything already on the chain.
    pub fn register(&self, handler: ExitHandler) -> CrtResult<()> {
        let Some(raw) = self.alloc.allocate(ENTRY_LAYOUT) else {
            klog_warn!("onexit[{}]: entry allocation failed", self.name);
            return Err(CrtError::OutOfMemory);
        };
        let entry = raw.cast::<ExitEntry>();

        let mut head = self.head.lock();
        // SAFETY: fresh allocation sized and aligned for ExitEntry.
        unsafe {
            entry.as_ptr().write(ExitEntry {
                next: head.0,
                handler,
            });
        }
        head.0 = Some(entry);
        Ok(())
    }

    /// Register a nullable C function pointer.
    pub fn register_fn(&self, func: Option<VoidCallback>) -> CrtResult<()> {
        let func = func.ok_or(CrtError::InvalidArgument)?;
        self.register(ExitHandler::Plain(func))
    }

    /// Run and free every entry, newest first, leaving the chain empty.
    ///
    /// Returns how many handlers ran. Draining an empty chain does nothing.
    pub fn drain(&self) -> usize {
        let mut cursor = self.head.lock().0.take();
        let mut ran = 0usize;

        while let Some(entry) = cursor {
            // SAFETY: the list was detached above, so this walk owns each node
            // exactly once; the node is read out before its memory is freed.
            let ExitEntry { next, handler } = unsafe { entry.as_ptr().read() };
            handler.invoke();
            unsafe { self.alloc.release(entry.cast(), ENTRY_LAYOUT) };
            ran += 1;
            cursor = next;
        }

        if ran != 0 {
            klog_debug!("onexit[{}]: ran {} handlers", self.name, ran);
        }
        ran
    }
}

impl<A: EntryAlloc> Drop for ExitChain<A> {
    fn drop(&mut self) {
        self.drain();
    }
}

/// Opaque chain address handed to C code, which passes it back to name the
/// chain an operation applies to.
pub type ChainHandle = *const c_void;

impl<A: EntryAlloc> ExitChain<A> {
    #[inline]
    pub fn handle(&self) -> ChainHandle {
        self as *const Self as ChainHandle
    }

    /// [`Self::register_fn`] in the C status convention.
    pub fn register_status(&self, func: Option<VoidCallback>) -> c_int {
        crt_status(self.register_fn(func))
    }
}

/// Resolve `handle` to one of the `known` chains. Unknown or null handles
/// give `None`; a handle is never dereferenced.
pub fn chain_from_handle<'a, A: EntryAlloc>(
    handle: ChainHandle,
    known: &[&'a ExitChain<A>],
) -> Option<&'a ExitChain<A>> {
    known
        .iter()
        .copied()
        .find(|chain| ptr::eq(chain.handle(), handle))
}

/// Register `func` on the chain named by `handle`.
pub fn register_on_handle<A: EntryAlloc>(
    handle: ChainHandle,
    func: Option<VoidCallback>,
    known: &[&ExitChain<A>],
) -> CrtResult<()> {
    let Some(chain) = chain_from_handle(handle, known) else {
        klog_warn!("onexit: registration on unknown chain {:p}", handle);
        return Err(CrtError::InvalidArgument);
    };
    chain.register_fn(func)
}

/// Drain the chain named by `handle`, returning how many handlers ran.
pub fn drain_handle<A: EntryAlloc>(
    handle: ChainHandle,
    known: &[&ExitChain<A>],
) -> CrtResult<usize> {
    let Some(chain) = chain_from_handle(handle, known) else {
        klog_warn!("onexit: drain of unknown chain {:p}", handle);
        return Err(CrtError::InvalidArgument);
    };
    Ok(chain.drain())
}

/// Handlers for normal process or image exit.
pub static NORMAL_EXIT: ExitChain = ExitChain::new("normal");
/// Handlers for `quick_exit`.
pub static QUICK_EXIT: ExitChain = ExitChain::new("quick");

/// The chains C callers may name by handle.
pub static PROCESS_CHAINS: [&ExitChain; 2] = [&NORMAL_EXIT, &QUICK_EXIT];

pub fn atexit(func: VoidCallback) -> CrtResult<()> {
    NORMAL_EXIT.register(ExitHandler::Plain(func))
}

pub fn at_quick_exit(func: VoidCallback) -> CrtResult<()> {
    QUICK_EXIT.register(ExitHandler::Plain(func))
}

/// Register on the normal chain, handing `func` back as the acknowledgement.
/// `None` comes back when `func` is null or the entry could not be allocated.
pub fn onexit(func: Option<StatusCallback>) -> Option<StatusCallback> {
    let func = func?;
    NORMAL_EXIT
        .register(ExitHandler::Status(func))
        .ok()
        .map(|()| func)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Recorder;
    use core::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingAlloc {
        live: AtomicUsize,
        total: AtomicUsize,
    }

    impl EntryAlloc for CountingAlloc {
        fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
            let ptr = HeapEntryAlloc.allocate(layout)?;
            self.live.fetch_add(1, Ordering::SeqCst);
            self.total.fetch_add(1, Ordering::SeqCst);
            Some(ptr)
        }

        unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
            self.live.fetch_sub(1, Ordering::SeqCst);
            unsafe { HeapEntryAlloc.release(ptr, layout) }
        }
    }

    struct NoMemory;

    impl EntryAlloc for NoMemory {
        fn allocate(&self, _layout: Layout) -> Option<NonNull<u8>> {
            None
        }

        unsafe fn release(&self, _ptr: NonNull<u8>, _layout: Layout) {
            unreachable!("nothing was ever allocated");
        }
    }

    #[test]
    fn drain_runs_newest_first() {
        static CALLS: Recorder = Recorder::new();
        extern "C" fn a() {
            CALLS.push("A");
        }
        extern "C" fn b() {
            CALLS.push("B");
        }
        extern "C" fn c() {
            CALLS.push("C");
        }

        let chain = ExitChain::new("test");
        for func in [a as VoidCallback, b, c] {
            chain.register(ExitHandler::Plain(func)).unwrap();
        }
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.drain(), 3);
        assert_eq!(CALLS.take(), ["C", "B", "A"]);
        assert!(chain.is_empty());
    }

    #[test]
    fn same_handler_registered_twice_runs_twice() {
        static CALLS: Recorder = Recorder::new();
        extern "C" fn tick() {
            CALLS.push("tick");
        }

        let chain = ExitChain::new("test");
        chain.register(ExitHandler::Plain(tick)).unwrap();
        chain.register(ExitHandler::Plain(tick)).unwrap();
        chain.drain();
        assert_eq!(CALLS.take(), ["tick", "tick"]);
    }

    #[test]
    fn draining_twice_is_a_no_op() {
        static CALLS: Recorder = Recorder::new();
        extern "C" fn once() {
            CALLS.push("once");
        }

        let chain = ExitChain::new("test");
        assert_eq!(chain.drain(), 0);
        chain.register(ExitHandler::Plain(once)).unwrap();
        assert_eq!(chain.drain(), 1);
        assert_eq!(chain.drain(), 0);
        assert_eq!(CALLS.take(), ["once"]);
    }

    #[test]
    fn every_node_is_released() {
        extern "C" fn noop() {}

        let chain = ExitChain::with_allocator("test", CountingAlloc::default());
        for _ in 0..16 {
            chain.register(ExitHandler::Plain(noop)).unwrap();
        }
        assert_eq!(chain.allocator().live.load(Ordering::SeqCst), 16);
        chain.drain();
        assert_eq!(chain.allocator().live.load(Ordering::SeqCst), 0);
        assert_eq!(chain.allocator().total.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn allocation_failure_is_reported_and_chain_untouched() {
        extern "C" fn never() {
            panic!("must not run");
        }

        let chain = ExitChain::with_allocator("test", NoMemory);
        assert_eq!(
            chain.register(ExitHandler::Plain(never)),
            Err(CrtError::OutOfMemory)
        );
        assert!(chain.is_empty());
        assert_eq!(chain.drain(), 0);
    }

    #[test]
    fn null_handler_is_rejected() {
        let chain = ExitChain::new("test");
        assert_eq!(chain.register_fn(None), Err(CrtError::InvalidArgument));
        assert_eq!(chain.register_status(None), -2);
        assert!(chain.is_empty());
    }

    #[test]
    fn register_status_reports_c_codes() {
        extern "C" fn noop() {}

        let chain = ExitChain::new("test");
        assert_eq!(chain.register_status(Some(noop)), 0);
        assert_eq!(chain.len(), 1);

        let starved = ExitChain::with_allocator("starved", NoMemory);
        assert_eq!(starved.register_status(Some(noop)), -1);
    }

    #[test]
    fn handles_route_to_the_named_chain_only() {
        static CALLS: Recorder = Recorder::new();
        static FIRST: ExitChain = ExitChain::new("first");
        static SECOND: ExitChain = ExitChain::new("second");
        static KNOWN: [&ExitChain; 2] = [&FIRST, &SECOND];
        extern "C" fn on_second() {
            CALLS.push("second");
        }

        assert!(ptr::eq(
            chain_from_handle(SECOND.handle(), &KNOWN).unwrap(),
            &SECOND
        ));
        register_on_handle(SECOND.handle(), Some(on_second), &KNOWN).unwrap();
        assert_eq!(drain_handle(FIRST.handle(), &KNOWN), Ok(0));
        assert!(CALLS.take().is_empty());
        assert_eq!(drain_handle(SECOND.handle(), &KNOWN), Ok(1));
        assert_eq!(CALLS.take(), ["second"]);
    }

    #[test]
    fn unknown_handles_are_rejected() {
        static KNOWN_CHAIN: ExitChain = ExitChain::new("known");
        static KNOWN: [&ExitChain; 1] = [&KNOWN_CHAIN];
        extern "C" fn never() {
            panic!("must not run");
        }

        let stray = ExitChain::new("stray");
        let not_a_chain = 0u64;
        for handle in [
            ptr::null(),
            stray.handle(),
            &not_a_chain as *const u64 as ChainHandle,
        ] {
            assert!(chain_from_handle(handle, &KNOWN).is_none());
            assert_eq!(
                register_on_handle(handle, Some(never), &KNOWN),
                Err(CrtError::InvalidArgument)
            );
            assert_eq!(drain_handle(handle, &KNOWN), Err(CrtError::InvalidArgument));
        }
        assert!(KNOWN_CHAIN.is_empty() && stray.is_empty());
    }

    #[test]
    fn status_handlers_run_and_results_are_ignored() {
        static CALLS: Recorder = Recorder::new();
        extern "C" fn failing() -> c_int {
            CALLS.push("failing");
            -1
        }
        extern "C" fn plain() {
            CALLS.push("plain");
        }

        let chain = ExitChain::new("test");
        chain.register(ExitHandler::Plain(plain)).unwrap();
        chain.register(ExitHandler::Status(failing)).unwrap();
        chain.register(ExitHandler::Plain(plain)).unwrap();
        assert_eq!(chain.drain(), 3);
        assert_eq!(CALLS.take(), ["plain", "failing", "plain"]);
    }

    #[test]
    fn dropping_a_chain_runs_its_handlers() {
        static CALLS: Recorder = Recorder::new();
        extern "C" fn last_words() {
            CALLS.push("bye");
        }

        {
            let chain = ExitChain::new("scoped");
            chain.register(ExitHandler::Plain(last_words)).unwrap();
        }
        assert_eq!(CALLS.take(), ["bye"]);
    }

    #[test]
    fn registering_during_drain_defers_to_next_drain() {
        static CHAIN: ExitChain = ExitChain::new("reentrant");
        static CALLS: Recorder = Recorder::new();
        extern "C" fn late() {
            CALLS.push("late");
        }
        extern "C" fn schedules_late() {
            CALLS.push("outer");
            CHAIN.register(ExitHandler::Plain(late)).unwrap();
        }

        CHAIN.register(ExitHandler::Plain(schedules_late)).unwrap();
        assert_eq!(CHAIN.drain(), 1);
        assert_eq!(CALLS.take(), ["outer"]);
        assert_eq!(CHAIN.drain(), 1);
        assert_eq!(CALLS.take(), ["late"]);
    }

    #[test]
    fn independent_chains_do_not_cross() {
        static CALLS: Recorder = Recorder::new();
        extern "C" fn quick() {
            CALLS.push("quick");
        }

        let normal = ExitChain::new("normal");
        let quick_chain = ExitChain::new("quick");
        for _ in 0..3 {
            quick_chain.register(ExitHandler::Plain(quick)).unwrap();
        }
        assert_eq!(normal.drain(), 0);
        assert!(CALLS.take().is_empty());
        assert_eq!(quick_chain.drain(), 3);
        assert_eq!(CALLS.take(), ["quick", "quick", "quick"]);
    }

    // The only test touching the process-wide chains.
    #[test]
    fn process_wide_chains_stay_separate() {
        static CALLS: Recorder = Recorder::new();
        extern "C" fn on_normal() {
            CALLS.push("normal");
        }
        extern "C" fn on_quick() {
            CALLS.push("quick");
        }
        extern "C" fn on_exit_status() -> c_int {
            CALLS.push("onexit");
            0
        }

        at_quick_exit(on_quick).unwrap();
        at_quick_exit(on_quick).unwrap();
        assert_eq!(NORMAL_EXIT.drain(), 0);
        assert!(CALLS.take().is_empty());

        atexit(on_normal).unwrap();
        assert!(onexit(Some(on_exit_status)).is_some());
        assert!(onexit(None).is_none());
        assert_eq!(NORMAL_EXIT.len(), 2);

        assert_eq!(NORMAL_EXIT.drain(), 2);
        assert_eq!(CALLS.take(), ["onexit", "normal"]);

        assert_eq!(
            register_on_handle(QUICK_EXIT.handle(), Some(on_quick), &PROCESS_CHAINS),
            Ok(())
        );
        assert_eq!(drain_handle(NORMAL_EXIT.handle(), &PROCESS_CHAINS), Ok(0));
        assert!(CALLS.take().is_empty());
        assert_eq!(QUICK_EXIT.len(), 3);
        assert_eq!(drain_handle(QUICK_EXIT.handle(), &PROCESS_CHAINS), Ok(3));
        assert_eq!(CALLS.take(), ["quick", "quick", "quick"]);
        assert!(NORMAL_EXIT.is_empty() && QUICK_EXIT.is_empty());
    }
}
