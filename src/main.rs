//! Walks hand-built paging structures and checks that the translated addresses
//! lead back to the data they map.
#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]

use log::{error, info};
use pagewalk_core::{
    MemoryReader, PhysAddr, TranslationError, VirtAddr, Walker,
    mem::{DirectMap, MemoryImage},
    paging::{ENTRY_SIZE, Flags, Level, PageSize},
};
use std::process::ExitCode;
use thiserror::Error;

mod logging;

/// PML4, PDPT, PD, PT and one data frame.
const FRAMES: u64 = 5;
const DATA_FRAME: u64 = FRAMES - 1;

#[derive(Error, Debug)]
enum CheckError {
    #[error(transparent)]
    Translation(#[from] TranslationError),
    #[error("Read {found} through {vaddr:#x}, expected {expected}")]
    Mismatch {
        vaddr: VirtAddr,
        found: u64,
        expected: u64,
    },
    #[error("{vaddr:#x} translated to {phys:#x}, expected {expected:#x}")]
    WrongAddress {
        vaddr: VirtAddr,
        phys: PhysAddr,
        expected: PhysAddr,
    },
    #[error("{vaddr:#x} should not be mapped")]
    UnexpectedMapping { vaddr: VirtAddr },
}

fn word_index(addr: u64) -> usize {
    usize::try_from(addr / ENTRY_SIZE).unwrap_or(usize::MAX)
}

fn expect_value<R: MemoryReader>(
    walker: &Walker<R>,
    table_base: u64,
    vaddr: VirtAddr,
    expected: u64,
) -> Result<(), CheckError> {
    let found = walker.read_u64(table_base, vaddr)?;
    info!("value (from page walk) = {found}, value (expected) = {expected}");
    if found == expected {
        Ok(())
    } else {
        Err(CheckError::Mismatch {
            vaddr,
            found,
            expected,
        })
    }
}

/// Build a 4 KiB mapping in a buffer read through a direct map, then read two words back.
fn check_4kib() -> Result<(), CheckError> {
    let frame_size = PageSize::Size4KiB.size();
    let mut memory = vec![0_u64; word_index(FRAMES * frame_size)];
    let vaddr = VirtAddr::new(0x0000_7f12_3456_7a40);

    // Table `n` sits in frame `n` and points to frame `n + 1`
    let parent = (Flags::PRESENT | Flags::WRITABLE).bits();
    for (frame, level) in (0..).zip(Level::ALL) {
        let entry_addr = frame * frame_size + u64::from(vaddr.index(level)) * ENTRY_SIZE;
        memory[word_index(entry_addr)] = ((frame + 1) * frame_size) | parent;
    }
    let data = DATA_FRAME * frame_size + vaddr.page_offset(PageSize::Size4KiB);
    memory[word_index(data)] = 42;
    memory[word_index(data + ENTRY_SIZE)] = 3;

    let walker = Walker::new(DirectMap::from_words(&memory));
    let translation = walker.walk(0, vaddr)?;
    for step in translation.steps() {
        info!(
            "Address of the {}E: {:#x}, contents: {:#x}",
            step.level,
            step.entry_addr,
            step.entry.as_u64()
        );
    }
    info!("Physical address: {:#x}", translation.phys());

    let expected = PhysAddr::new(data);
    if translation.phys() != expected {
        return Err(CheckError::WrongAddress {
            vaddr,
            phys: translation.phys(),
            expected,
        });
    }

    expect_value(&walker, 0, vaddr, 42)?;
    expect_value(&walker, 0, VirtAddr::new(vaddr.as_u64() + ENTRY_SIZE), 3)
}

/// Build a 1 GiB mapping in a sparse image and check the translation keeps the low 30 bits.
fn check_1gib() -> Result<(), CheckError> {
    let table_base = 0x1000;
    let vaddr = VirtAddr::new(0x7fff_2345_6788);
    let huge = (Flags::PRESENT | Flags::WRITABLE | Flags::HUGE_PAGE).bits();

    let pml4e = table_base + u64::from(vaddr.index(Level::Pml4)) * ENTRY_SIZE;
    let pdpte = 0x2000 + u64::from(vaddr.index(Level::Pdpt)) * ENTRY_SIZE;
    // Frame number 0x2 of a 1 GiB page
    let page = 0x2 << PageSize::Size1GiB.shift();
    let data = page | vaddr.page_offset(PageSize::Size1GiB);

    let image = MemoryImage::new()
        .with_entry(pml4e, 0x2000 | Flags::PRESENT.bits())
        .with_entry(pdpte, 0x2000 | huge)
        .with_entry(data, 42);

    let walker = Walker::new(image);
    let translation = walker.walk(table_base, vaddr)?;
    info!(
        "{:#x} maps {:#x} after {} reads",
        vaddr,
        translation.phys(),
        translation.reads()
    );

    let expected = PhysAddr::new(data);
    if translation.phys() != expected {
        return Err(CheckError::WrongAddress {
            vaddr,
            phys: translation.phys(),
            expected,
        });
    }
    expect_value(&walker, table_base, vaddr, 42)
}

/// A walk through an empty PML4 slot must stop at the first level.
fn check_unmapped() -> Result<(), CheckError> {
    let vaddr = VirtAddr::new(1 << Level::Pml4.index_bits().0);
    let image = MemoryImage::new()
        .with_entry(0x1000, 0x2003)
        .with_entry(0x1000 + ENTRY_SIZE, 0);

    match Walker::new(image).translate(0x1000, vaddr) {
        Err(TranslationError::NotPresent { level: Level::Pml4 }) => {
            info!("{vaddr:#x} is not mapped at the PML4 level");
            Ok(())
        }
        Err(err) => Err(err.into()),
        Ok(_) => Err(CheckError::UnexpectedMapping { vaddr }),
    }
}

fn main() -> ExitCode {
    if let Err(err) = logging::init() {
        eprintln!("Failed to set logger: {err}");
        return ExitCode::FAILURE;
    }

    let checks: [(&str, fn() -> Result<(), CheckError>); 3] = [
        ("4 KiB walk", check_4kib),
        ("1 GiB walk", check_1gib),
        ("unmapped walk", check_unmapped),
    ];

    let mut failed = false;
    for (name, check) in checks {
        match check() {
            Ok(()) => info!("{name}: ok"),
            Err(err) => {
                error!("{name}: {err}");
                failed = true;
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
