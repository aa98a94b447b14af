//! Pool configuration consumed by allocation code outside the runtime

use bitflags::bitflags;

use crate::version::HostVersion;

/// Allocation class handed to the host pool allocator.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PoolType {
    /// Executable non-paged pool, the only class older hosts understand
    NonPagedPool = 0,
    #[default]
    NonPagedPoolNx = 512,
}

impl PoolType {
    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            512 => Self::NonPagedPoolNx,
            _ => Self::NonPagedPool,
        }
    }
}

bitflags! {
    /// Extra page protection requested when mapping MDLs.
    #[repr(transparent)]
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct MdlProtection: u32 {
        const NO_EXECUTE = 0x4000_0000;
    }
}

impl Default for MdlProtection {
    fn default() -> Self {
        Self::NO_EXECUTE
    }
}

/// Four-character pool tag, stored little-endian like the host expects.
pub const DEFAULT_POOL_TAG: u32 = u32::from_le_bytes(*b"ksrt");

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    pub tag: u32,
    pub pool_type: PoolType,
    pub mdl_protection: MdlProtection,
}

impl PoolConfig {
    /// Compiled-in defaults, assuming a current host.
    pub const DEFAULT: Self = Self {
        tag: DEFAULT_POOL_TAG,
        pool_type: PoolType::NonPagedPoolNx,
        mdl_protection: MdlProtection::NO_EXECUTE,
    };

    /// The same configuration with no-execute features stripped.
    pub const fn conservative(self) -> Self {
        Self {
            tag: self.tag,
            pool_type: PoolType::NonPagedPool,
            mdl_protection: MdlProtection::empty(),
        }
    }

    /// Pick the configuration for a host. `None` means the version is
    /// unknown; the current configuration is kept in that case.
    pub fn for_host(self, version: Option<HostVersion>) -> Self {
        match version {
            Some(v) if v.is_older_than(HostVersion::NX_POOL_THRESHOLD) => self.conservative(),
            _ => self,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn older_hosts_get_conservative_pool() {
        let cfg = PoolConfig::DEFAULT.for_host(Some(HostVersion::new(6, 1)));
        assert_eq!(cfg.pool_type, PoolType::NonPagedPool);
        assert!(cfg.mdl_protection.is_empty());
        assert_eq!(cfg.tag, DEFAULT_POOL_TAG);
    }

    #[test]
    fn threshold_and_newer_keep_defaults() {
        for v in [HostVersion::new(6, 2), HostVersion::new(10, 0)] {
            assert_eq!(PoolConfig::DEFAULT.for_host(Some(v)), PoolConfig::DEFAULT);
        }
        assert_eq!(PoolConfig::DEFAULT.for_host(None), PoolConfig::DEFAULT);
    }

    #[test]
    fn pool_type_from_raw() {
        assert_eq!(PoolType::from_raw(512), PoolType::NonPagedPoolNx);
        assert_eq!(PoolType::from_raw(0), PoolType::NonPagedPool);
    }
}
