//! Collaborators of the walker: where the table base comes from and how entries are read.
use crate::{PhysAddr, VirtAddr, paging::ENTRY_SIZE};
use core::marker::PhantomData;
use thiserror::Error;

#[cfg(feature = "alloc")]
mod image;
#[cfg(feature = "alloc")]
pub use image::MemoryImage;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// An error raised by a [`MemoryReader`] when a physical address cannot be read.
pub enum AccessFault {
    #[error("No memory backs physical address {addr:#x}")]
    Unbacked { addr: PhysAddr },
    #[error("Unaligned 8-byte read at physical address {addr:#x}")]
    Unaligned { addr: PhysAddr },
}

/// Reads 8-byte words of physical memory.
///
/// Implementations resolve physical addresses to something they can dereference
/// without further translation (a direct map, a memory image, an emulator's RAM...).
pub trait MemoryReader {
    /// Read the 8-byte little-endian word at `addr`.
    ///
    /// ## Errors
    ///
    /// Returns an [`AccessFault`] if the address cannot be read.
    fn read_u64(&self, addr: PhysAddr) -> Result<u64, AccessFault>;
}

impl<R: MemoryReader + ?Sized> MemoryReader for &R {
    #[inline]
    fn read_u64(&self, addr: PhysAddr) -> Result<u64, AccessFault> {
        (**self).read_u64(addr)
    }
}

/// Supplies the value of the top-level table-base register.
///
/// Bits below 12 of the value are ignored by the walker.
pub trait TableBaseSource {
    fn table_base(&self) -> u64;
}

impl TableBaseSource for u64 {
    #[inline]
    fn table_base(&self) -> u64 {
        *self
    }
}

impl TableBaseSource for PhysAddr {
    #[inline]
    fn table_base(&self) -> u64 {
        self.as_u64()
    }
}

#[cfg(target_arch = "x86_64")]
/// The CR3 register of the current CPU.
///
/// Reading it is only allowed at CPL 0.
pub struct Cr3;

#[cfg(target_arch = "x86_64")]
impl Cr3 {
    #[must_use]
    #[inline]
    pub fn read_raw() -> u64 {
        let value: u64;

        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) value, options(nomem, nostack, preserves_flags));
        }

        value
    }

    #[must_use]
    #[inline]
    /// Returns the PML4 table address and the low flag/PCID bits.
    pub fn read() -> (PhysAddr, u16) {
        Self::split(Self::read_raw())
    }

    #[must_use]
    #[inline]
    /// Splits a CR3 value into the PML4 table address and the low flag/PCID bits.
    pub const fn split(value: u64) -> (PhysAddr, u16) {
        let addr = PhysAddr::new_truncate(crate::bits::install(0, value, 0, 11));
        #[allow(clippy::cast_possible_truncation)]
        let flags = crate::bits::select(value, 0, 11) as u16;
        (addr, flags)
    }
}

#[cfg(target_arch = "x86_64")]
impl TableBaseSource for Cr3 {
    #[inline]
    fn table_base(&self) -> u64 {
        Self::read().0.as_u64()
    }
}

#[derive(Debug, Clone, Copy)]
/// Reader for a direct map: physical address `p` lives at virtual address `base + p`.
///
/// Only the first `len` bytes of physical memory are reachable.
pub struct DirectMap<'a> {
    base: VirtAddr,
    len: u64,
    _memory: PhantomData<&'a [u64]>,
}

impl DirectMap<'static> {
    #[must_use]
    #[inline]
    /// ## Safety
    ///
    /// `base` must be 8-byte aligned and the `len` bytes starting at `base` must stay
    /// readable for as long as the reader is used.
    pub const unsafe fn new(base: VirtAddr, len: u64) -> Self {
        Self {
            base,
            len,
            _memory: PhantomData,
        }
    }
}

impl<'a> DirectMap<'a> {
    #[must_use]
    #[inline]
    /// Use `words` as physical memory starting at physical address 0.
    pub fn from_words(words: &'a [u64]) -> Self {
        Self {
            base: VirtAddr::from_ptr(words.as_ptr()),
            len: words.len() as u64 * ENTRY_SIZE,
            _memory: PhantomData,
        }
    }

    #[must_use]
    #[inline]
    pub const fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl MemoryReader for DirectMap<'_> {
    fn read_u64(&self, addr: PhysAddr) -> Result<u64, AccessFault> {
        if !addr.is_aligned(ENTRY_SIZE) {
            return Err(AccessFault::Unaligned { addr });
        }
        let in_bounds = addr
            .as_u64()
            .checked_add(ENTRY_SIZE)
            .is_some_and(|end| end <= self.len);
        if !in_bounds {
            return Err(AccessFault::Unbacked { addr });
        }

        let ptr = (self.base.as_u64() + addr.as_u64()) as *const u64;
        // Safety: The word is inside the window, which the constructor guarantees readable
        Ok(unsafe { ptr.read_volatile() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_map() {
        let words = [0x1003_u64, 0x2003, 42, 3];
        let reader = DirectMap::from_words(&words);

        assert_eq!(reader.len(), 32);
        assert_eq!(reader.read_u64(PhysAddr::new(0)), Ok(0x1003));
        assert_eq!(reader.read_u64(PhysAddr::new(0x10)), Ok(42));
        assert_eq!(reader.read_u64(PhysAddr::new(0x18)), Ok(3));
    }

    #[test]
    fn test_direct_map_faults() {
        let words = [0_u64; 4];
        let reader = DirectMap::from_words(&words);

        assert_eq!(
            reader.read_u64(PhysAddr::new(0x20)),
            Err(AccessFault::Unbacked {
                addr: PhysAddr::new(0x20)
            })
        );
        assert_eq!(
            reader.read_u64(PhysAddr::new(0x4)),
            Err(AccessFault::Unaligned {
                addr: PhysAddr::new(0x4)
            })
        );
        assert!(DirectMap::from_words(&[]).is_empty());
    }

    #[test]
    fn test_direct_map_raw() {
        let words = [7_u64, 8];
        let reader = unsafe { DirectMap::new(VirtAddr::from_ptr(words.as_ptr()), 16) };
        assert_eq!(reader.read_u64(PhysAddr::new(8)), Ok(8));
    }

    #[test]
    fn test_reader_by_ref() {
        fn read_first<R: MemoryReader>(reader: R) -> Result<u64, AccessFault> {
            reader.read_u64(PhysAddr::ZERO)
        }

        let words = [5_u64];
        let reader = DirectMap::from_words(&words);
        assert_eq!(read_first(&reader), Ok(5));
        assert_eq!(read_first(&&reader), Ok(5));
    }

    #[test]
    fn test_table_base_sources() {
        fn base<S: TableBaseSource>(source: &S) -> u64 {
            source.table_base()
        }

        assert_eq!(base(&0x1018_u64), 0x1018);
        assert_eq!(base(&PhysAddr::new(0x2000)), 0x2000);
        #[cfg(target_arch = "x86_64")]
        {
            // Reading CR3 faults outside of ring 0, only check that it is a source
            let _ = base::<Cr3>;
        }
    }

    #[test]
    #[cfg(target_arch = "x86_64")]
    fn test_cr3_split() {
        assert_eq!(Cr3::split(0x1000), (PhysAddr::new(0x1000), 0));
        assert_eq!(Cr3::split(0x1018), (PhysAddr::new(0x1000), 0x18));
        assert_eq!(
            Cr3::split(0x000F_FFFF_FFFF_FFFF),
            (PhysAddr::new(0x000F_FFFF_FFFF_F000), 0xFFF)
        );
    }
}
