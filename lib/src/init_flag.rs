//! One-shot flag for runtime phases that must happen at most once.
//!
//! ```ignore
//! static DEFAULTS_APPLIED: InitFlag = InitFlag::new();
//!
//! if !DEFAULTS_APPLIED.init_once() {
//!     return;
//! }
//! ```

use core::sync::atomic::{AtomicBool, Ordering};

#[repr(transparent)]
pub struct InitFlag {
    flag: AtomicBool,
}

impl InitFlag {
    #[inline]
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    /// Claim the flag. Returns `true` only for the caller that flipped it.
    #[inline]
    pub fn init_once(&self) -> bool {
        !self.flag.swap(true, Ordering::SeqCst)
    }

    /// Acquire load; pairs with [`Self::mark_set`] and [`Self::init_once`].
    #[inline]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Set after the guarded work is finished, publishing its side effects.
    #[inline]
    pub fn mark_set(&self) {
        self.flag.store(true, Ordering::Release);
    }

}

impl Default for InitFlag {
    fn default() -> Self {
        Self::new()
    }
}
