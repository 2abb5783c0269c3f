//! Paging structures as seen by the walker.
//!
//! It defines the `Level` of each table, the `Entry` stored in them and the `Flags` inside an entry,
//! as well as the page sizes a walk can terminate on.
use crate::{PhysAddr, bits, static_assert};
use core::fmt;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Size in bytes of a paging-structure entry.
pub const ENTRY_SIZE: u64 = 8;
/// Number of entries in every paging structure.
pub const ENTRY_COUNT: u64 = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
/// A level of the 4-level paging hierarchy, numbered by its depth.
pub enum Level {
    /// Page-Map Level 4.
    Pml4 = 4,
    /// Page-Directory-Pointer Table.
    Pdpt = 3,
    /// Page Directory.
    Pd = 2,
    /// Page Table.
    Pt = 1,
}

impl Level {
    /// Every level, in walk order.
    pub const ALL: [Self; 4] = [Self::Pml4, Self::Pdpt, Self::Pd, Self::Pt];

    #[must_use]
    #[inline]
    /// Inclusive range of virtual address bits indexing the table at this level.
    pub const fn index_bits(self) -> (u32, u32) {
        match self {
            Self::Pml4 => (39, 47),
            Self::Pdpt => (30, 38),
            Self::Pd => (21, 29),
            Self::Pt => (12, 20),
        }
    }

    #[must_use]
    #[inline]
    /// The page mapped by an entry of this level when its PS bit is set.
    ///
    /// PS is reserved in a PML4E and meaningless in a PTE.
    pub const fn page_size_if_huge(self) -> Option<PageSize> {
        match self {
            Self::Pdpt => Some(PageSize::Size1GiB),
            Self::Pd => Some(PageSize::Size2MiB),
            Self::Pml4 | Self::Pt => None,
        }
    }

    #[must_use]
    #[inline]
    /// The level below this one, if any.
    pub fn next(self) -> Option<Self> {
        Self::try_from(u8::from(self) - 1).ok()
    }

    #[must_use]
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pml4 => "PML4",
            Self::Pdpt => "PDPT",
            Self::Pd => "PD",
            Self::Pt => "PT",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PageSize {
    Size4KiB,
    Size2MiB,
    Size1GiB,
}

impl PageSize {
    #[must_use]
    #[inline]
    /// Number of low virtual address bits carried into the physical address.
    pub const fn shift(self) -> u32 {
        match self {
            Self::Size4KiB => 12,
            Self::Size2MiB => 21,
            Self::Size1GiB => 30,
        }
    }

    #[must_use]
    #[inline]
    pub const fn size(self) -> u64 {
        1 << self.shift()
    }
}

static_assert!(PageSize::Size2MiB.size() == PageSize::Size4KiB.size() * ENTRY_COUNT);
static_assert!(PageSize::Size1GiB.size() == PageSize::Size2MiB.size() * ENTRY_COUNT);
static_assert!(PageSize::Size4KiB.size() == ENTRY_SIZE * ENTRY_COUNT);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Flags(u64);

impl Flags {
    pub const PRESENT: Self = Self(1);
    pub const WRITABLE: Self = Self(1 << 1);
    pub const USER_ACCESSIBLE: Self = Self(1 << 2);
    pub const WRITE_THROUGH: Self = Self(1 << 3);
    pub const CACHE_DISABLED: Self = Self(1 << 4);
    pub const ACCESSED: Self = Self(1 << 5);
    pub const DIRTY: Self = Self(1 << 6);
    /// The PS bit.
    pub const HUGE_PAGE: Self = Self(1 << 7);
    pub const GLOBAL: Self = Self(1 << 8);
    pub const NO_EXECUTE: Self = Self(1 << 63);

    const ALL: Self = Self(0x8000_0000_0000_01FF);
    pub const EMPTY: Self = Self(0);

    #[must_use]
    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[must_use]
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl core::ops::BitOr for Flags {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
/// A raw paging-structure entry.
pub struct Entry(u64);

impl Entry {
    #[must_use]
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[must_use]
    #[inline]
    pub const fn flags(self) -> Flags {
        Flags(self.0 & Flags::ALL.0)
    }

    #[must_use]
    #[inline]
    pub const fn is_present(self) -> bool {
        self.flags().contains(Flags::PRESENT)
    }

    #[must_use]
    #[inline]
    pub const fn is_huge(self) -> bool {
        self.flags().contains(Flags::HUGE_PAGE)
    }

    #[must_use]
    #[inline]
    /// Bits 51:12 of the entry, at every level.
    pub const fn frame_number(self) -> u64 {
        bits::select(self.0, 12, 51)
    }

    #[must_use]
    #[inline]
    /// The frame number shifted into place for a page or table of `1 << shift` bytes.
    pub const fn frame_base(self, shift: u32) -> u64 {
        self.frame_number() << shift
    }

    #[must_use]
    #[inline]
    /// Physical address of the next-level table this entry points to.
    pub const fn table_base(self) -> PhysAddr {
        PhysAddr::new_truncate(self.frame_base(PageSize::Size4KiB.shift()))
    }
}

impl From<u64> for Entry {
    #[inline]
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_order() {
        assert_eq!(Level::Pml4.next(), Some(Level::Pdpt));
        assert_eq!(Level::Pdpt.next(), Some(Level::Pd));
        assert_eq!(Level::Pd.next(), Some(Level::Pt));
        assert_eq!(Level::Pt.next(), None);

        let mut level = Some(Level::Pml4);
        for expected in Level::ALL {
            assert_eq!(level, Some(expected));
            level = expected.next();
        }
    }

    #[test]
    fn test_level_depth() {
        assert_eq!(u8::from(Level::Pml4), 4);
        assert_eq!(Level::try_from(1u8).ok(), Some(Level::Pt));
        assert!(Level::try_from(0u8).is_err());
        assert!(Level::try_from(5u8).is_err());
    }

    #[test]
    fn test_index_bits_are_contiguous() {
        for level in Level::ALL {
            let (low, high) = level.index_bits();
            assert_eq!(high - low, 8);
            if let Some(next) = level.next() {
                assert_eq!(next.index_bits().1 + 1, low);
            }
        }
        assert_eq!(Level::Pt.index_bits().0, PageSize::Size4KiB.shift());
    }

    #[test]
    fn test_huge_levels() {
        assert_eq!(Level::Pml4.page_size_if_huge(), None);
        assert_eq!(Level::Pdpt.page_size_if_huge(), Some(PageSize::Size1GiB));
        assert_eq!(Level::Pd.page_size_if_huge(), Some(PageSize::Size2MiB));
        assert_eq!(Level::Pt.page_size_if_huge(), None);
        for level in [Level::Pdpt, Level::Pd] {
            let size = level.page_size_if_huge().unwrap();
            assert_eq!(size.shift(), level.index_bits().0);
        }
    }

    #[test]
    fn test_entry() {
        let pte = Entry::new(0x4067);
        assert!(pte.is_present());
        assert!(!pte.is_huge());
        assert!(pte.flags().contains(Flags::WRITABLE | Flags::USER_ACCESSIBLE | Flags::DIRTY));
        assert_eq!(pte.frame_number(), 0x4);
        assert_eq!(pte.table_base(), PhysAddr::new(0x4000));

        let pdpte = Entry::new(0x2087);
        assert!(pdpte.is_present());
        assert!(pdpte.is_huge());
        assert_eq!(pdpte.frame_base(PageSize::Size1GiB.shift()), 0x8000_0000);

        assert!(!Entry::new(0x1002).is_present());
    }

    #[test]
    fn test_entry_ignores_high_bits() {
        let entry = Entry::new(0x8FF0_0000_0000_5003);
        assert!(entry.flags().contains(Flags::NO_EXECUTE));
        assert_eq!(entry.frame_number(), 0x5);
        assert_eq!(entry.table_base().as_u64(), 0x5000);
    }

    #[test]
    fn test_display() {
        extern crate alloc;
        use alloc::string::ToString;

        assert_eq!(Level::Pml4.to_string(), "PML4");
        assert_eq!(Level::Pt.to_string(), "PT");
    }
}
