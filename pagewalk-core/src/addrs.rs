//! Abstraction of physical and virtual addresses.
use crate::{
    bits,
    paging::{Level, PageSize},
};
use core::fmt;

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
/// A virtual address.
///
/// Only bits 47:0 take part in translation. Canonical form is not enforced.
pub struct VirtAddr(u64);

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
/// A physical address.
pub struct PhysAddr(u64);

impl VirtAddr {
    pub const ZERO: Self = Self(0);

    #[must_use]
    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    #[must_use]
    #[inline]
    pub fn from_ptr<T: ?Sized>(ptr: *const T) -> Self {
        Self(ptr.cast::<()>() as u64)
    }

    #[must_use]
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[must_use]
    #[inline]
    /// The 9-bit index into the table at `level`.
    pub fn index(self, level: Level) -> u16 {
        let (low, high) = level.index_bits();
        u16::try_from(bits::select(self.0, low, high)).unwrap()
    }

    #[must_use]
    #[inline]
    /// The offset of the address inside a page of the given size.
    pub const fn page_offset(self, size: PageSize) -> u64 {
        bits::select(self.0, 0, size.shift() - 1)
    }
}

impl PhysAddr {
    pub const MAX: Self = Self(0x000F_FFFF_FFFF_FFFF);
    pub const ZERO: Self = Self(0);

    #[must_use]
    #[track_caller]
    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self::try_new(addr).expect("Invalid physical address")
    }

    #[must_use]
    #[inline]
    pub const fn try_new(addr: u64) -> Option<Self> {
        let truncated = Self::new_truncate(addr);
        if truncated.as_u64() != addr {
            return None;
        }
        Some(truncated)
    }

    #[must_use]
    #[inline]
    pub const fn new_truncate(addr: u64) -> Self {
        Self(addr & Self::MAX.0)
    }

    #[must_use]
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[must_use]
    #[inline]
    pub const fn is_aligned(self, align: u64) -> bool {
        assert!(align.is_power_of_two());
        self.0 & (align - 1) == 0
    }
}

impl fmt::LowerHex for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::UpperHex for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.0, f)
    }
}

impl fmt::LowerHex for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::UpperHex for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.0, f)
    }
}

impl From<VirtAddr> for u64 {
    #[inline]
    fn from(addr: VirtAddr) -> Self {
        addr.0
    }
}

impl From<PhysAddr> for u64 {
    #[inline]
    fn from(addr: PhysAddr) -> Self {
        addr.0
    }
}
