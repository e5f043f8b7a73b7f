//! The TLSF allocator core.
use core::{alloc::Layout, hint::unreachable_unchecked, mem, ptr, ptr::NonNull};

use alloc::alloc::{alloc, dealloc};

use crate::int::BinInteger;

/// The minimum block size.
///
/// Every request is rounded up to a multiple of this granularity, and no
/// block ever becomes shorter. It must be at least two pointers wide so
/// that a free inline block can keep its list links in its own payload.
pub const MIN_BLOCK_SIZE: usize = 32;

/// Second-level subdivision count, expressed as an exponent of two for
/// bitwise shifting. `1 << 5` = 32 sub-bands per first-level class.
const SLI_SHIFT: u32 = 5;
const SL_COUNT: usize = 1 << SLI_SHIFT;

/// One first-level class per machine-word bit.
const FL_COUNT: usize = usize::BITS as usize;

const WORD: usize = mem::size_of::<usize>();

/// The bit of [`BlockHdr::len`] flagging a free block. Real lengths keep
/// it clear because they are multiples of [`MIN_BLOCK_SIZE`].
const LEN_FREE: usize = 1;

/// Length of the header prepended to every inline block: the length word
/// and the physical link. The free-list links that follow overlap the
/// payload and only exist while the block is free.
const BLKHDR_LEN: usize = mem::offset_of!(BlockHdr, next_free);

/// Where block headers live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Headers are prepended inside the managed extent. The extent must be
    /// real, writable memory; allocations return payload addresses.
    Inline,
    /// Headers are records in a side arena. The managed extent is never
    /// read or written; allocations return opaque [`BlockRef`] handles.
    External,
}

/// Physical linkage of a block, interpreted per [`Mode`].
#[repr(C)]
union PhysLink {
    /// `Mode::Inline`: the physically preceding block, `None` for the
    /// first block of the extent.
    prev: Option<NonNull<BlockHdr>>,
    /// `Mode::External`: the absolute address of the managed region.
    addr: usize,
}

/// A block header.
///
/// Inline blocks store this at the start of their region; the physical
/// successor is reached by address arithmetic over `len`. External blocks
/// embed it in an [`ExtBlockHdr`] record instead.
#[repr(C)]
struct BlockHdr {
    /// Region length, excluding the inline header. `bit[0]` ([`LEN_FREE`])
    /// flags a free block.
    len: usize,
    link: PhysLink,
    /// Segregated-list links, meaningful only while the block is free.
    next_free: Option<NonNull<BlockHdr>>,
    prev_free: Option<NonNull<BlockHdr>>,
}

impl BlockHdr {
    #[inline]
    fn length(&self) -> usize {
        self.len & !LEN_FREE
    }

    #[inline]
    fn is_free(&self) -> bool {
        self.len & LEN_FREE != 0
    }
}

/// An external-mode header record, threaded in managed-address order.
#[repr(C)]
struct ExtBlockHdr {
    hdr: BlockHdr,
    next_phys: Option<NonNull<ExtBlockHdr>>,
    prev_phys: Option<NonNull<ExtBlockHdr>>,
}

const EXT_RECORD_LAYOUT: Layout = Layout::new::<ExtBlockHdr>();

/// An opaque handle to an allocated block, returned by
/// [`Tlsf::allocate_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct BlockRef(NonNull<BlockHdr>);

#[doc = svgbobdoc::transform!(
/// The TLSF allocator state.
///
/// # Data Structure Overview
///
/// <center>
/// ```svgbob
///   First level
///                               one bit per power-of-two size class
///                               ,-----+-----+-----+-----+-----+-----,
///            l1_free: usize  =  | ... |  0  |  1  |  0  |  0  |  0  |
///                               +-----+-----+-----+-----+-----+-----+
///                      min size | ... |  2⁹ |  2⁸ |  2⁷ |  2⁶ |  2⁵ |
///                               '-----+-----+--+--+-----+-----+-----'
///                                              |
/// ╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶|╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶
///   Second Level                               |
///                                              v     32 sub-bands
///                                  ,-----+-----+-----+-------+-----,
///         "l2_free[8]: usize"   =  |  0  |  1  |  0  |  ...  |  0  |
///                                  +-----+-----+-----+-------+-----+
///              min size 2⁸(1+n/32) |  31 |  30 |  29 |  ...  |  0  |
///                                  +-----+-----+-----+-------+-----+
///                     "map[8][..]" |     |  o  |     |  ...  |     |
///                                  '-----+--|--+-----+-------+-----'
///                                           |
/// ╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶|╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶╶
///   Free blocks                             |
///             ,-----------------------------'
///             | ,---+---+------,     ,---+---+------,
///             '-+>o | o-+------+-----+>o |   |      |
///               +---+---'      |     +---+---'      |
///               |              |     |              |
///               '--------------'     '--------------'
///                   496 bytes            480 bytes
/// ```
/// </center>
///
/// # Properties
///
/// Every block is at least [`MIN_BLOCK_SIZE`] long. The whole extent is
/// covered by blocks chained in physical-address order: inline blocks
/// carry a pointer to their predecessor and compute their successor from
/// their own length, external blocks sit on a doubly linked record list.
/// Free blocks are additionally threaded through the segregated list of
/// their `(first level, second level)` size class, and the two bitmap
/// levels summarise which classes are populated.
///
/// The allocator is single-threaded: every mutating operation takes
/// `&mut self`, and sharing one instance across threads requires external
/// synchronisation that grants exclusive access.
)]
#[derive(Debug)]
pub struct Tlsf {
    /// Start of the managed extent. Never dereferenced in external mode.
    base: usize,
    size: usize,
    /// Sum of the lengths of all free blocks.
    free: usize,
    mode: Mode,
    /// External-mode header records in managed-address order.
    blklist: Option<NonNull<ExtBlockHdr>>,
    l1_free: usize,
    l2_free: [usize; FL_COUNT],
    map: [[Option<NonNull<BlockHdr>>; SL_COUNT]; FL_COUNT],
}

// Safety: all block headers directly or indirectly referenced by a
//         particular instance of `Tlsf` are logically owned by that
//         instance and have no interior mutability.
unsafe impl Send for Tlsf {}
unsafe impl Sync for Tlsf {}

/// Map a length to its (first, second) level class.
///
/// The first level is the power-of-two band, `log2(size)`. The second
/// level is the top [`SLI_SHIFT`] bits of the offset into that band:
///
/// ```text
/// fl = log2(size)
/// sl = (size ^ (1 << fl)) >> (fl - SLI_SHIFT)
/// ```
#[inline]
fn size_class(size: usize) -> (usize, usize) {
    debug_assert!(size >= MIN_BLOCK_SIZE);
    let fl = size.ilog2();
    let sl = (size ^ (1usize << fl)) >> (fl - SLI_SHIFT);
    debug_assert!((fl as usize) < FL_COUNT);
    debug_assert!(sl < SL_COUNT);
    (fl as usize, sl)
}

impl Tlsf {
    /// Construct an allocator managing `size` bytes (inline mode) or
    /// abstract units (external mode) starting at `base`.
    ///
    /// The size is aligned down to a multiple of [`MIN_BLOCK_SIZE`]. An
    /// extent too small to hold a single minimum block yields a live
    /// allocator on which every allocation fails.
    ///
    /// Returns `None` when `base` is not word-aligned in inline mode, when
    /// `base + size` would overflow the address space, or when the initial
    /// external header record cannot be obtained.
    ///
    /// # Safety
    ///
    /// In inline mode, `[base, base + size)` must be valid for reads and
    /// writes for the whole lifetime of the returned value, and nothing
    /// else may access that memory while the allocator is live. External
    /// mode never dereferences `base` and has no requirements on it.
    pub unsafe fn new(base: usize, size: usize, mode: Mode) -> Option<Tlsf> {
        if mode == Mode::Inline && base % WORD != 0 {
            return None;
        }

        // Align the extent length down to the granularity.
        let size = (size.checked_add(MIN_BLOCK_SIZE)? & !(MIN_BLOCK_SIZE - 1)) - MIN_BLOCK_SIZE;
        base.checked_add(size)?;

        let mut tlsf = Tlsf {
            base,
            size,
            free: 0,
            mode,
            blklist: None,
            l1_free: 0,
            l2_free: [0; FL_COUNT],
            map: [[None; SL_COUNT]; FL_COUNT],
        };

        // Lay out the initial block spanning the whole extent. An extent
        // with no room for a minimum block leaves the maps empty.
        match mode {
            Mode::Inline => {
                if size >= BLKHDR_LEN + MIN_BLOCK_SIZE {
                    let blk = base as *mut BlockHdr;
                    blk.write(BlockHdr {
                        len: size - BLKHDR_LEN,
                        link: PhysLink { prev: None },
                        next_free: None,
                        prev_free: None,
                    });
                    tlsf.insert_block(NonNull::new_unchecked(blk));
                }
            }
            Mode::External => {
                if size >= MIN_BLOCK_SIZE {
                    let rec = alloc(EXT_RECORD_LAYOUT) as *mut ExtBlockHdr;
                    if rec.is_null() {
                        return None;
                    }
                    rec.write(ExtBlockHdr {
                        hdr: BlockHdr {
                            len: size,
                            link: PhysLink { addr: base },
                            next_free: None,
                            prev_free: None,
                        },
                        next_phys: None,
                        prev_phys: None,
                    });
                    tlsf.blklist = Some(NonNull::new_unchecked(rec));
                    tlsf.insert_block(NonNull::new_unchecked(rec as *mut BlockHdr));
                }
            }
        }

        Some(tlsf)
    }

    /// Length of the header consumed out of the extent by each block.
    #[inline]
    fn hdr_len(&self) -> usize {
        match self.mode {
            Mode::Inline => BLKHDR_LEN,
            Mode::External => 0,
        }
    }

    /// The block physically preceding `blk`, if any.
    unsafe fn prev_phys_block(&self, blk: NonNull<BlockHdr>) -> Option<NonNull<BlockHdr>> {
        match self.mode {
            Mode::Inline => blk.as_ref().link.prev,
            Mode::External => blk.cast::<ExtBlockHdr>().as_ref().prev_phys.map(|p| p.cast()),
        }
    }

    /// The block physically following `blk`, if any.
    unsafe fn next_phys_block(&self, blk: NonNull<BlockHdr>) -> Option<NonNull<BlockHdr>> {
        match self.mode {
            Mode::Inline => {
                let end = self.base + self.size;
                let next = blk.as_ptr() as usize + BLKHDR_LEN + blk.as_ref().length();
                debug_assert!(next <= end);
                (next < end).then(|| NonNull::new_unchecked(next as *mut BlockHdr))
            }
            Mode::External => blk.cast::<ExtBlockHdr>().as_ref().next_phys.map(|n| n.cast()),
        }
    }

    /// Diagnostic check of one header and its physical neighbour links.
    /// Meant to run under `debug_assert!` only.
    unsafe fn validate_block(&self, blk: NonNull<BlockHdr>) -> bool {
        let addr = match self.mode {
            Mode::Inline => blk.as_ptr() as usize,
            Mode::External => blk.as_ref().link.addr,
        };
        let start = self.base;
        let end = self.base + self.size;
        let len = blk.as_ref().length();

        // At least one minimum block, no more than the whole extent.
        debug_assert!(len >= MIN_BLOCK_SIZE);
        debug_assert!(len <= self.size);

        // The block must lie within the extent.
        debug_assert!(addr >= start);
        debug_assert!(addr < end);

        // The predecessor's computed successor must be us, and the
        // successor must link back to us. The first and last physical
        // blocks are exempt on the respective side.
        let prev = self.prev_phys_block(blk);
        let next = self.next_phys_block(blk);
        debug_assert!(addr == start || prev.map_or(false, |p| self.next_phys_block(p) == Some(blk)));
        debug_assert!(next.map_or(true, |n| self.prev_phys_block(n) == Some(blk)));
        true
    }

    /// Materialise a new header for the space directly after `parent`,
    /// covering `len` units.
    ///
    /// Returns `None` when an external header record cannot be obtained.
    unsafe fn block_hdr_alloc(
        &mut self,
        parent: NonNull<BlockHdr>,
        len: usize,
    ) -> Option<NonNull<BlockHdr>> {
        match self.mode {
            Mode::Inline => {
                // The new block begins where the parent's region ends. Wire
                // the predecessor pointers of the block and of whatever
                // follows it.
                let blk = (parent.as_ptr() as usize + BLKHDR_LEN + parent.as_ref().length())
                    as *mut BlockHdr;
                blk.write(BlockHdr {
                    len,
                    link: PhysLink {
                        prev: Some(parent),
                    },
                    next_free: None,
                    prev_free: None,
                });
                let blk = NonNull::new_unchecked(blk);
                if let Some(mut next) = self.next_phys_block(blk) {
                    next.as_mut().link.prev = Some(blk);
                }
                Some(blk)
            }
            Mode::External => {
                let rec = NonNull::new(alloc(EXT_RECORD_LAYOUT) as *mut ExtBlockHdr)?;
                let mut parent = parent.cast::<ExtBlockHdr>();
                rec.as_ptr().write(ExtBlockHdr {
                    hdr: BlockHdr {
                        len,
                        link: PhysLink {
                            addr: parent.as_ref().hdr.link.addr + parent.as_ref().hdr.length(),
                        },
                        next_free: None,
                        prev_free: None,
                    },
                    next_phys: parent.as_ref().next_phys,
                    prev_phys: Some(parent),
                });
                if let Some(mut next) = rec.as_ref().next_phys {
                    next.as_mut().prev_phys = Some(rec);
                }
                parent.as_mut().next_phys = Some(rec);
                Some(rec.cast())
            }
        }
    }

    /// Retire a header whose region has been absorbed by its physical
    /// predecessor.
    unsafe fn block_hdr_free(&mut self, blk: NonNull<BlockHdr>) {
        debug_assert!(!blk.as_ref().is_free());

        match self.mode {
            Mode::Inline => {
                // Patch the successor to skip the dead header. `blk` still
                // describes its old region, so its successor is the block
                // following the absorbed space.
                if let Some(mut next) = self.next_phys_block(blk) {
                    next.as_mut().link.prev = blk.as_ref().link.prev;
                    debug_assert!(self.validate_block(next));
                }
                // Poison the dead header so stale references trip fast.
                if cfg!(debug_assertions) {
                    ptr::write_bytes(blk.as_ptr(), 0, 1);
                }
            }
            Mode::External => {
                let rec = blk.cast::<ExtBlockHdr>();
                match rec.as_ref().prev_phys {
                    Some(mut prev) => prev.as_mut().next_phys = rec.as_ref().next_phys,
                    None => self.blklist = rec.as_ref().next_phys,
                }
                if let Some(mut next) = rec.as_ref().next_phys {
                    next.as_mut().prev_phys = rec.as_ref().prev_phys;
                }
                dealloc(rec.as_ptr() as *mut u8, EXT_RECORD_LAYOUT);
            }
        }
    }

    /// Insert a free block into its segregated list and publish the class
    /// in the bitmaps.
    unsafe fn insert_block(&mut self, mut blk: NonNull<BlockHdr>) {
        debug_assert!(self.validate_block(blk));
        debug_assert!(!blk.as_ref().is_free());

        let len = blk.as_ref().len;
        let (fl, sl) = size_class(len);
        let head = self.map[fl][sl];
        if let Some(mut head) = head {
            head.as_mut().prev_free = Some(blk);
        }
        blk.as_mut().prev_free = None;
        blk.as_mut().next_free = head;
        self.map[fl][sl] = Some(blk);

        // Mark the block free and account for it.
        self.free += len;
        blk.as_mut().len = len | LEN_FREE;

        self.l1_free.set_bit(fl as u32);
        self.l2_free[fl].set_bit(sl as u32);
    }

    /// Unlink a free block: the given one, or the head of cell `(fl, sl)`.
    unsafe fn remove_block(
        &mut self,
        target: Option<NonNull<BlockHdr>>,
        fl: usize,
        sl: usize,
    ) -> NonNull<BlockHdr> {
        let mut blk = match target {
            Some(blk) => blk,
            None => {
                debug_assert!(self.map[fl][sl].is_some());
                self.map[fl][sl].unwrap_or_else(|| unreachable_unchecked())
            }
        };

        let next_free = blk.as_ref().next_free;
        let prev_free = blk.as_ref().prev_free;
        if let Some(mut next) = next_free {
            next.as_mut().prev_free = prev_free;
        }
        if let Some(mut prev) = prev_free {
            prev.as_mut().next_free = next_free;
        }
        if self.map[fl][sl] == Some(blk) {
            self.map[fl][sl] = next_free;
        }

        debug_assert!(blk.as_ref().is_free());
        let len = blk.as_ref().len & !LEN_FREE;
        blk.as_mut().len = len;
        self.free -= len;

        // The cell emptied: retire its bit, and the first-level bit with
        // it once no populated second-level cell remains.
        if self.map[fl][sl].is_none() {
            self.l2_free[fl].clear_bit(sl as u32);
            if self.l2_free[fl] == 0 {
                self.l1_free.clear_bit(fl as u32);
            }
        }

        debug_assert!(self.validate_block(blk));
        blk
    }

    /// Locate a populated cell whose every member is at least `target`
    /// long.
    #[inline]
    fn search_suitable_cell(&self, target: usize) -> Option<(usize, usize)> {
        let (mut fl, mut sl) = size_class(target);

        // Fast path: a second-level cell at or above `sl` in the same
        // first-level class.
        sl = self.l2_free[fl].bit_scan_forward(sl as u32) as usize;
        if sl >= SL_COUNT {
            // Fall back to the next populated first level, lowest cell.
            fl = self.l1_free.bit_scan_forward(fl as u32 + 1) as usize;
            if fl >= FL_COUNT {
                return None;
            }
            sl = self.l2_free[fl].trailing_zeros() as usize;
            debug_assert!(sl < SL_COUNT);
        }
        debug_assert!(self.l2_free[fl].get_bit(sl as u32));
        Some((fl, sl))
    }

    /// Split `blk`, keeping `size` units in it and spinning the excess
    /// into a new block, which is returned.
    ///
    /// When the external header record for the remainder cannot be
    /// obtained the split is abandoned and `blk` keeps its full length.
    unsafe fn split_block(
        &mut self,
        mut blk: NonNull<BlockHdr>,
        size: usize,
    ) -> Option<NonNull<BlockHdr>> {
        let rem = blk.as_ref().length() - self.hdr_len() - size;
        debug_assert_eq!(rem & LEN_FREE, 0);
        debug_assert_eq!(size & LEN_FREE, 0);
        blk.as_mut().len = size;

        let remblk = self.block_hdr_alloc(blk, rem);
        if remblk.is_none() {
            blk.as_mut().len = size + rem;
        }
        remblk
    }

    /// Merge two physically adjacent blocks. `blk2` is destroyed and the
    /// merged block keeps `blk`'s identity.
    unsafe fn merge_blocks(
        &mut self,
        mut blk: NonNull<BlockHdr>,
        blk2: NonNull<BlockHdr>,
    ) -> NonNull<BlockHdr> {
        debug_assert!(self.validate_block(blk));
        debug_assert!(self.validate_block(blk2));

        // Both blocks must be off the segregated lists before surgery.
        let addlen = blk2.as_ref().length();
        if blk.as_ref().is_free() {
            let (fl, sl) = size_class(blk.as_ref().length());
            self.remove_block(Some(blk), fl, sl);
        }
        if blk2.as_ref().is_free() {
            let (fl, sl) = size_class(addlen);
            self.remove_block(Some(blk2), fl, sl);
        }

        // The first block absorbs the second's space, header included.
        blk.as_mut().len += self.hdr_len() + addlen;
        self.block_hdr_free(blk2);
        blk
    }

    /// Allocate a block of at least `size` bytes/units and return its
    /// handle. Works in both modes; in inline mode [`Tlsf::allocate`]
    /// additionally yields the payload address.
    ///
    /// Returns `None` when no free block can serve the request.
    ///
    /// # Time Complexity
    ///
    /// This method will complete in constant time.
    pub fn allocate_block(&mut self, size: usize) -> Option<BlockRef> {
        // Round up to the granularity, then aim one size class higher so
        // any block in the located cell is large enough.
        let size = (size.checked_add(MIN_BLOCK_SIZE - 1)? & !(MIN_BLOCK_SIZE - 1))
            .max(MIN_BLOCK_SIZE);
        let target = size.checked_add((1usize << (size.ilog2() - SLI_SHIFT)) - 1)?;

        let (fl, sl) = self.search_suitable_cell(target)?;

        unsafe {
            let blk = self.remove_block(None, fl, sl);
            debug_assert!(blk.as_ref().length() >= size);

            // Split off the excess, unless what would remain is too small
            // to stand on its own.
            if blk.as_ref().len - size >= MIN_BLOCK_SIZE + self.hdr_len() {
                if let Some(rem) = self.split_block(blk, size) {
                    self.insert_block(rem);
                }
            }
            Some(BlockRef(blk))
        }
    }

    /// Allocate at least `size` bytes and return the payload address.
    /// Inline mode only.
    ///
    /// The payload is word-aligned: the base is word-aligned and the
    /// header length is a multiple of the word size.
    ///
    /// Returns `None` when no free block can serve the request.
    ///
    /// # Time Complexity
    ///
    /// This method will complete in constant time.
    pub fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        debug_assert_eq!(self.mode, Mode::Inline);
        let blk = self.allocate_block(size)?;
        let ptr = blk.0.as_ptr() as usize + BLKHDR_LEN;
        debug_assert_eq!(ptr % WORD, 0);
        // Safety: the header sits at or above the word-aligned base, so
        //         the payload address cannot be zero.
        Some(unsafe { NonNull::new_unchecked(ptr as *mut u8) })
    }

    /// Release a block obtained from [`Tlsf::allocate_block`], merging it
    /// with free physical neighbours.
    ///
    /// # Time Complexity
    ///
    /// This method will complete in constant time.
    ///
    /// # Safety
    ///
    /// `blk` must have been returned by `allocate_block` on `self` and not
    /// have been released since.
    pub unsafe fn deallocate_block(&mut self, blk: BlockRef) {
        let mut blk = blk.0;
        debug_assert!(!blk.as_ref().is_free(), "block released twice");

        // Fetch both neighbours before any merge rewrites the chain.
        let prev = self.prev_phys_block(blk);
        let next = self.next_phys_block(blk);

        if let Some(prev) = prev {
            if prev.as_ref().is_free() {
                blk = self.merge_blocks(prev, blk);
            }
        }
        if let Some(next) = next {
            if next.as_ref().is_free() {
                blk = self.merge_blocks(blk, next);
            }
        }
        self.insert_block(blk);
    }

    /// Release a payload address obtained from [`Tlsf::allocate`]. Inline
    /// mode only.
    ///
    /// # Time Complexity
    ///
    /// This method will complete in constant time.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on `self` and not have
    /// been released since.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        debug_assert_eq!(self.mode, Mode::Inline);
        let blk = NonNull::new_unchecked((ptr.as_ptr() as usize - BLKHDR_LEN) as *mut BlockHdr);
        self.deallocate_block(BlockRef(blk));
    }

    /// Base-relative offset and length of an allocated block.
    ///
    /// In inline mode the offset designates the payload; in external mode
    /// it designates the start of the managed region.
    ///
    /// # Safety
    ///
    /// `blk` must be a live handle obtained from `allocate_block` on
    /// `self`.
    pub unsafe fn block_span(&self, blk: BlockRef) -> (usize, usize) {
        let hdr = blk.0.as_ref();
        let addr = match self.mode {
            Mode::Inline => blk.0.as_ptr() as usize + BLKHDR_LEN,
            Mode::External => hdr.link.addr,
        };
        (addr - self.base, hdr.length())
    }

    /// Total unused space: the sum of the lengths of all free blocks,
    /// which is not necessarily contiguous. See [`Tlsf::avail_space`] for
    /// what a single allocation can actually get.
    pub fn unused_space(&self) -> usize {
        self.free
    }

    /// The largest request guaranteed to succeed right now, or zero when
    /// no free block exists.
    ///
    /// Reads the head of the highest populated cell and steps its length
    /// back through the allocation-time rounding.
    pub fn avail_space(&self) -> usize {
        // Find the largest free block: highest first-level class, then
        // highest second-level cell within it.
        let fl = self.l1_free.bit_scan_reverse() as usize;
        if fl >= FL_COUNT {
            return 0;
        }
        let sl = self.l2_free[fl].bit_scan_reverse() as usize;
        if sl >= SL_COUNT {
            return 0;
        }
        let blk = match self.map[fl][sl] {
            Some(blk) => blk,
            None => {
                debug_assert!(false);
                return 0;
            }
        };

        // Safety: list heads are owned, live headers.
        let len = unsafe {
            debug_assert!(self.validate_block(blk));
            blk.as_ref().length()
        };
        debug_assert!(self.free >= len);

        // Step down to the last size class a request could name and still
        // be guaranteed this block by the class search.
        let len = len & !(MIN_BLOCK_SIZE - 1);
        (len + 1) - (1usize << (len.ilog2() - SLI_SHIFT))
    }
}

impl Drop for Tlsf {
    fn drop(&mut self) {
        // Return external header records to the backing allocator.
        let mut cur = self.blklist.take();
        while let Some(rec) = cur {
            // Safety: records on the physical list are owned by us and
            //         were obtained from the global allocator.
            unsafe {
                cur = rec.as_ref().next_phys;
                dealloc(rec.as_ptr() as *mut u8, EXT_RECORD_LAYOUT);
            }
        }
    }
}
