//! This crate implements the TLSF (Two-Level Segregated Fit) dynamic
//! storage allocation algorithm¹ over a single extent supplied by the
//! application, with a choice of where the block bookkeeping lives.
//!
//!  - **Allocation and release complete in constant time.** Locating a
//!    suitable block takes two bit scans and one list-head read, whatever
//!    the heap population. TLSF is suitable for real-time and interactive
//!    systems.
//!
//!  - **Two header modes.** In [`Mode::Inline`], block headers are
//!    prepended inside the managed extent, like a conventional heap
//!    allocator. In [`Mode::External`], headers are records in a side
//!    arena and the extent itself is never read or written, so the
//!    allocator can carve up resources that are not memory at all:
//!    device address space, file regions, identifier ranges.
//!
//!  - **The extent is provided by the application.** A `static` buffer, an
//!    arena obtained from another allocator, or (in external mode) any
//!    half-open integer range.
//!
//!  - **This crate supports `#![no_std]`.** External mode draws its header
//!    records from the global allocator; inline mode performs no dynamic
//!    allocation at all after construction.
//!
//! <sub>¹ M. Masmano, I. Ripoll, A. Crespo and J. Real, "TLSF: a new
//! dynamic memory allocator for real-time systems," *Proceedings. 16th
//! Euromicro Conference on Real-Time Systems*, 2004. ECRTS 2004., Catania,
//! Italy, 2004, pp. 79-88, doi: 10.1109/EMRTS.2004.1311009.</sub>
//!
//! # Examples
//!
//! ## Inline headers: allocating from a memory pool
//!
//! ```rust
//! use tlsf_ext::{Mode, Tlsf};
//!
//! // A word-aligned backing store of 64 KiB.
//! let mut pool = [0usize; 8192];
//! let base = pool.as_mut_ptr() as usize;
//!
//! // Safety: the pool is writable and outlives the allocator.
//! let mut tlsf =
//!     unsafe { Tlsf::new(base, core::mem::size_of_val(&pool), Mode::Inline) }.unwrap();
//!
//! let ptr = tlsf.allocate(100).unwrap();
//! unsafe {
//!     ptr.as_ptr().write(0xa5);
//!     tlsf.deallocate(ptr);
//! }
//! ```
//!
//! ## External headers: managing space the allocator never touches
//!
//! ```rust
//! use tlsf_ext::{Mode, Tlsf};
//!
//! // Carve up 1 MiB of device address space starting at 0x4000_0000.
//! // Safety: external mode never dereferences the base.
//! let mut tlsf = unsafe { Tlsf::new(0x4000_0000, 1 << 20, Mode::External) }.unwrap();
//!
//! let blk = tlsf.allocate_block(4096).unwrap();
//! let (offset, len) = unsafe { tlsf.block_span(blk) };
//! assert_eq!(offset, 0);
//! assert!(len >= 4096);
//!
//! unsafe { tlsf.deallocate_block(blk) };
//! assert_eq!(tlsf.unused_space(), 1 << 20);
//! ```
#![no_std]

extern crate alloc;

pub mod int;
mod tlsf;
pub use self::tlsf::{BlockRef, Mode, Tlsf, MIN_BLOCK_SIZE};

#[cfg(test)]
extern crate std;
