//! Version-gated pool defaults.
//!
//! Allocation code reads the process-wide [`PoolConfig`] through
//! [`pool_defaults`]. The values start at the compiled-in defaults and are
//! adjusted once during bring-up by [`initialize_defaults`], which downgrades
//! to the conservative pool class on hosts older than 6.2.

use core::sync::atomic::{AtomicU32, Ordering};

use ksrt_abi::{HostQueryError, HostVersion, MdlProtection, PoolConfig, PoolType};
use ksrt_lib::{InitFlag, klog_info, klog_warn};

/// Reports the running host's version.
pub trait HostVersionQuery {
    fn host_version(&self) -> Result<HostVersion, HostQueryError>;
}

/// A fixed answer, for hosts that learn their version some other way.
impl HostVersionQuery for HostVersion {
    fn host_version(&self) -> Result<HostVersion, HostQueryError> {
        Ok(*self)
    }
}

/// Lock-free holder for a [`PoolConfig`].
///
/// Each field is its own atomic. Writers only run during single-threaded
/// bring-up, so readers never observe a torn update in practice.
pub struct PoolDefaults {
    tag: AtomicU32,
    pool_type: AtomicU32,
    mdl_protection: AtomicU32,
}

impl PoolDefaults {
    pub const fn new(config: PoolConfig) -> Self {
        Self {
            tag: AtomicU32::new(config.tag),
            pool_type: AtomicU32::new(config.pool_type as u32),
            mdl_protection: AtomicU32::new(config.mdl_protection.bits()),
        }
    }

    pub fn snapshot(&self) -> PoolConfig {
        PoolConfig {
            tag: self.tag.load(Ordering::Acquire),
            pool_type: PoolType::from_raw(self.pool_type.load(Ordering::Acquire)),
            mdl_protection: MdlProtection::from_bits_truncate(
                self.mdl_protection.load(Ordering::Acquire),
            ),
        }
    }

    pub fn store(&self, config: PoolConfig) {
        self.tag.store(config.tag, Ordering::Release);
        self.pool_type
            .store(config.pool_type as u32, Ordering::Release);
        self.mdl_protection
            .store(config.mdl_protection.bits(), Ordering::Release);
    }

    /// Apply the host version gate to these defaults.
    ///
    /// A failed query is not an error: the current values stay in place.
    pub fn apply_host(&self, query: &dyn HostVersionQuery) -> PoolConfig {
        let current = self.snapshot();
        let version = match query.host_version() {
            Ok(version) => version,
            Err(err) => {
                klog_warn!("pool defaults: {}, keeping compiled-in values", err);
                return current;
            }
        };

        let chosen = current.for_host(Some(version));
        if chosen != current {
            klog_info!(
                "pool defaults: host {} predates {}, using conservative pool",
                version,
                HostVersion::NX_POOL_THRESHOLD
            );
            self.store(chosen);
        }
        chosen
    }
}

static POOL_DEFAULTS: PoolDefaults = PoolDefaults::new(PoolConfig::DEFAULT);
static DEFAULTS_INITIALIZED: InitFlag = InitFlag::new();

/// Query the host and adjust the process-wide pool defaults.
///
/// Meant to run once during bring-up. Calling it again repeats the same
/// comparison and lands on the same values.
pub fn initialize_defaults(query: &dyn HostVersionQuery) {
    POOL_DEFAULTS.apply_host(query);
    DEFAULTS_INITIALIZED.mark_set();
}

/// Current process-wide pool configuration.
#[inline]
pub fn pool_defaults() -> PoolConfig {
    POOL_DEFAULTS.snapshot()
}

/// Whether [`initialize_defaults`] has run.
#[inline]
pub fn defaults_initialized() -> bool {
    DEFAULTS_INITIALIZED.is_set()
}
