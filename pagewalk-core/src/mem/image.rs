//! Sparse physical memory held in a map of 8-byte words.
use super::{AccessFault, MemoryReader};
use crate::{PhysAddr, paging::ENTRY_SIZE};
use alloc::collections::BTreeMap;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
/// A sparse physical address space: only written words are backed.
pub struct MemoryImage {
    words: BTreeMap<u64, u64>,
}

impl MemoryImage {
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self {
            words: BTreeMap::new(),
        }
    }

    #[must_use]
    #[track_caller]
    /// Builder form of [`Self::write_u64`].
    ///
    /// ## Panics
    ///
    /// Panics if `addr` is not a valid, 8-byte aligned physical address.
    pub fn with_entry(mut self, addr: u64, value: u64) -> Self {
        self.write_u64(PhysAddr::new(addr), value)
            .expect("Unaligned memory image entry");
        self
    }

    pub fn write_u64(&mut self, addr: PhysAddr, value: u64) -> Result<(), AccessFault> {
        if !addr.is_aligned(ENTRY_SIZE) {
            return Err(AccessFault::Unaligned { addr });
        }
        self.words.insert(addr.as_u64(), value);
        Ok(())
    }

    #[must_use]
    #[inline]
    /// Number of words that have been written.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl MemoryReader for MemoryImage {
    fn read_u64(&self, addr: PhysAddr) -> Result<u64, AccessFault> {
        if !addr.is_aligned(ENTRY_SIZE) {
            return Err(AccessFault::Unaligned { addr });
        }
        self.words
            .get(&addr.as_u64())
            .copied()
            .ok_or(AccessFault::Unbacked { addr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image() {
        let mut image = MemoryImage::new().with_entry(0x17F8, 0x1003);
        assert!(image.write_u64(PhysAddr::new(0x2000), 0x3003).is_ok());
        assert_eq!(image.len(), 2);

        assert_eq!(image.read_u64(PhysAddr::new(0x17F8)), Ok(0x1003));
        assert_eq!(image.read_u64(PhysAddr::new(0x2000)), Ok(0x3003));
        assert_eq!(
            image.read_u64(PhysAddr::new(0x3000)),
            Err(AccessFault::Unbacked {
                addr: PhysAddr::new(0x3000)
            })
        );
        assert_eq!(
            MemoryImage::new().read_u64(PhysAddr::ZERO),
            Err(AccessFault::Unbacked {
                addr: PhysAddr::ZERO
            })
        );
    }

    #[test]
    fn test_image_unaligned() {
        let mut image = MemoryImage::new();
        let addr = PhysAddr::new(0x1001);
        assert_eq!(image.write_u64(addr, 1), Err(AccessFault::Unaligned { addr }));
        assert_eq!(image.read_u64(addr), Err(AccessFault::Unaligned { addr }));
        assert!(image.is_empty());
    }

    #[test]
    #[should_panic = "Unaligned memory image entry"]
    fn test_image_builder_unaligned() {
        let _ = MemoryImage::new().with_entry(0x1004, 1);
    }
}
