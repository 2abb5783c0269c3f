//! The translation walker.
//!
//! Every level is handled the same way: the address of the entry is the table base (bits 51:12)
//! with the 9-bit index of the level installed at bits 11:3. The entry is read, its present bit is
//! checked, and the walk either descends to the table the entry points to or, for a huge page or
//! at the PT level, stops and installs the page offset of the virtual address below the frame.
//!
//! Frame numbers are always bits 51:12 of an entry, shifted by the size of what they map.
use crate::{
    PhysAddr, TranslationError, VirtAddr, bits,
    mem::{MemoryReader, TableBaseSource},
    paging::{Entry, Level, PageSize},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Which huge page sizes the walker honours.
///
/// A PS bit found at a level whose page size is disabled stops the walk with
/// [`TranslationError::UnexpectedHugePage`].
pub struct WalkConfig {
    huge_1gib: bool,
    huge_2mib: bool,
}

impl Default for WalkConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl WalkConfig {
    #[must_use]
    #[inline]
    /// 4 KiB, 2 MiB and 1 GiB pages.
    pub const fn new() -> Self {
        Self {
            huge_1gib: true,
            huge_2mib: true,
        }
    }

    #[must_use]
    #[inline]
    /// Only 4 KiB pages: a PS bit at any level fails the walk.
    pub const fn small_pages_only() -> Self {
        Self {
            huge_1gib: false,
            huge_2mib: false,
        }
    }

    #[must_use]
    #[inline]
    pub const fn with_1gib_pages(mut self, enabled: bool) -> Self {
        self.huge_1gib = enabled;
        self
    }

    #[must_use]
    #[inline]
    pub const fn with_2mib_pages(mut self, enabled: bool) -> Self {
        self.huge_2mib = enabled;
        self
    }

    #[must_use]
    #[inline]
    pub const fn allows(self, size: PageSize) -> bool {
        match size {
            PageSize::Size4KiB => true,
            PageSize::Size2MiB => self.huge_2mib,
            PageSize::Size1GiB => self.huge_1gib,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// One entry read during a walk.
pub struct WalkStep {
    pub level: Level,
    pub entry_addr: PhysAddr,
    pub entry: Entry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A successful translation, along with the entries that produced it.
pub struct Translation {
    vaddr: VirtAddr,
    phys: PhysAddr,
    page_size: PageSize,
    steps: [Option<WalkStep>; Level::ALL.len()],
}

impl Translation {
    #[must_use]
    #[inline]
    pub const fn vaddr(&self) -> VirtAddr {
        self.vaddr
    }

    #[must_use]
    #[inline]
    pub const fn phys(&self) -> PhysAddr {
        self.phys
    }

    #[must_use]
    #[inline]
    pub const fn page_size(&self) -> PageSize {
        self.page_size
    }

    #[inline]
    /// The entries visited, from PML4 down.
    pub fn steps(&self) -> impl Iterator<Item = &WalkStep> {
        self.steps.iter().flatten()
    }

    #[must_use]
    #[inline]
    /// Number of entries read from memory.
    pub fn reads(&self) -> usize {
        self.steps().count()
    }

    #[must_use]
    #[inline]
    /// The entry that maps the page.
    pub fn leaf(&self) -> Option<&WalkStep> {
        self.steps().last()
    }
}

#[must_use]
#[inline]
/// Physical address of the entry for `vaddr` in the table at `table`.
pub const fn entry_address(table: PhysAddr, vaddr: VirtAddr, level: Level) -> PhysAddr {
    let (low, high) = level.index_bits();
    let index = bits::select(vaddr.as_u64(), low, high);
    PhysAddr::new_truncate(bits::install(index, table.as_u64(), 3, 11))
}

#[must_use]
#[inline]
/// Physical address of the PML4 table held in a table-base register value.
pub const fn pml4_base(table_base: u64) -> PhysAddr {
    PhysAddr::new_truncate(bits::select(table_base, 12, 51) << 12)
}

#[must_use]
#[inline]
/// Physical address of `vaddr` inside the page of `size` mapped by `entry`.
pub const fn page_address(entry: Entry, vaddr: VirtAddr, size: PageSize) -> PhysAddr {
    let offset_high = size.shift() - 1;
    let offset = bits::select(vaddr.as_u64(), 0, offset_high);
    PhysAddr::new_truncate(bits::install(
        offset,
        entry.frame_base(size.shift()),
        0,
        offset_high,
    ))
}

fn failed(error: TranslationError, vaddr: VirtAddr) -> TranslationError {
    log::debug!("Translation of {vaddr:#x} failed: {error}");
    error
}

/// Walks paging structures read through a [`MemoryReader`].
pub struct Walker<R: MemoryReader> {
    reader: R,
    config: WalkConfig,
}

impl<R: MemoryReader> Walker<R> {
    #[must_use]
    #[inline]
    pub const fn new(reader: R) -> Self {
        Self::with_config(reader, WalkConfig::new())
    }

    #[must_use]
    #[inline]
    pub const fn with_config(reader: R, config: WalkConfig) -> Self {
        Self { reader, config }
    }

    #[must_use]
    #[inline]
    pub const fn config(&self) -> WalkConfig {
        self.config
    }

    #[must_use]
    #[inline]
    pub const fn reader(&self) -> &R {
        &self.reader
    }

    /// Walk the paging structures rooted at `table_base` for `vaddr`.
    ///
    /// Each entry is read exactly once and the walk stops at the first entry that cannot be used.
    pub fn walk(&self, table_base: u64, vaddr: VirtAddr) -> Result<Translation, TranslationError> {
        let mut steps = [None; Level::ALL.len()];
        let mut table = pml4_base(table_base);

        for (depth, level) in Level::ALL.into_iter().enumerate() {
            let entry_addr = entry_address(table, vaddr, level);
            let entry = self
                .reader
                .read_u64(entry_addr)
                .map(Entry::new)
                .map_err(|fault| failed(fault.into(), vaddr))?;

            log::trace!("{level} entry at {entry_addr:#x}: {:#x}", entry.as_u64());
            steps[depth] = Some(WalkStep {
                level,
                entry_addr,
                entry,
            });

            if !entry.is_present() {
                return Err(failed(TranslationError::NotPresent { level }, vaddr));
            }

            // PS is reserved in a PML4E, the walk never looks at it there
            let page_size = if level == Level::Pml4 || !entry.is_huge() {
                level.next().is_none().then_some(PageSize::Size4KiB)
            } else {
                match level.page_size_if_huge() {
                    Some(size) if self.config.allows(size) => Some(size),
                    _ => {
                        return Err(failed(
                            TranslationError::UnexpectedHugePage { level },
                            vaddr,
                        ));
                    }
                }
            };

            if let Some(page_size) = page_size {
                let phys = page_address(entry, vaddr, page_size);
                log::debug!("Translated {vaddr:#x} to {phys:#x} ({level} level)");
                return Ok(Translation {
                    vaddr,
                    phys,
                    page_size,
                    steps,
                });
            }

            table = entry.table_base();
        }

        unreachable!("The PT level always terminates the walk")
    }

    #[inline]
    pub fn translate(&self, table_base: u64, vaddr: VirtAddr) -> Result<PhysAddr, TranslationError> {
        self.walk(table_base, vaddr).map(|translation| translation.phys())
    }

    #[inline]
    /// Translate `vaddr` using the table base currently held by `source`.
    pub fn translate_current<S: TableBaseSource + ?Sized>(
        &self,
        source: &S,
        vaddr: VirtAddr,
    ) -> Result<PhysAddr, TranslationError> {
        self.translate(source.table_base(), vaddr)
    }

    /// Translate `vaddr`, then read the word it maps to through the same reader.
    pub fn read_u64(&self, table_base: u64, vaddr: VirtAddr) -> Result<u64, TranslationError> {
        let phys = self.translate(table_base, vaddr)?;
        Ok(self.reader.read_u64(phys)?)
    }
}

/// Translate `vaddr` through the paging structures rooted at `table_base`.
///
/// 1 GiB and 2 MiB pages are honoured. See [`Walker`] for other configurations.
pub fn translate<R: MemoryReader + ?Sized>(
    table_base: u64,
    vaddr: u64,
    reader: &R,
) -> Result<PhysAddr, TranslationError> {
    Walker::new(reader).translate(table_base, VirtAddr::new(vaddr))
}
