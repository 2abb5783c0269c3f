//! Software model of x86-64 hierarchical address translation.
//!
//! Given the value of the top-level table-base register (CR3) and a virtual address,
//! the walker follows the PML4, PDPT, PD and PT structures through a [`mem::MemoryReader`]
//! and produces the physical address, or the level at which translation stopped.
//!
//! ```rust
//! # #[cfg(feature = "alloc")]
//! # fn main() {
//! use pagewalk_core::{AccessFault, PhysAddr, TranslationError, mem::MemoryImage, paging::Level};
//!
//! let memory = MemoryImage::new()
//!     .with_entry(0x1000, 0x2003) // PML4E -> PDPT at 0x2000
//!     .with_entry(0x2000, 0x3003) // PDPTE -> PD at 0x3000
//!     .with_entry(0x3000, 0x4003) // PDE -> PT at 0x4000
//!     .with_entry(0x4008, 0x5003) // PTE -> page at 0x5000
//!     .with_entry(0x4010, 0); // empty PTE
//!
//! let phys = pagewalk_core::translate(0x1000, 0x1234, &memory).unwrap();
//! assert_eq!(phys.as_u64(), 0x5234);
//!
//! assert_eq!(
//!     pagewalk_core::translate(0x1000, 0x2000, &memory),
//!     Err(TranslationError::NotPresent { level: Level::Pt }),
//! );
//!
//! // Nothing was written for the PTE at 0x4018
//! assert_eq!(
//!     pagewalk_core::translate(0x1000, 0x3000, &memory),
//!     Err(TranslationError::AccessFault(AccessFault::Unbacked {
//!         addr: PhysAddr::new(0x4018)
//!     })),
//! );
//! # }
//! # #[cfg(not(feature = "alloc"))]
//! # fn main() {}
//! ```
#![no_std]
#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::doc_markdown)]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod addrs;
pub mod bits;
mod error;
pub mod mem;
pub mod paging;
pub mod walk;

pub use addrs::{PhysAddr, VirtAddr};
pub use error::TranslationError;
pub use mem::{AccessFault, MemoryReader, TableBaseSource};
pub use walk::{Translation, WalkConfig, WalkStep, Walker, translate};

#[macro_export]
macro_rules! static_assert {
    ($condition:expr $(, $($arg:tt)+)?) => {
        const _: () = assert!($condition $(, $($arg)+)?);
    };
}
