//! Block header model (component 1).
//!
//! Every managed region — arena-resident or mapped — is prefixed by a
//! `Block`. The header footprint `HEADER_SIZE` is a compile-time
//! constant; the payload pointer handed back to callers is always
//! `header address + HEADER_SIZE`.

use std::mem;
use std::ptr;

use crate::align::pad;

/// A block's role in the heap.
///
/// `Free` and `Alloc` blocks live in `free_list`/`used_list`
/// respectively; `Mapped` blocks live in neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
  Free,
  Alloc,
  Mapped,
}

/// Fixed-layout metadata prefixing every payload.
///
/// `size` means different things depending on `status`: for `Free`/
/// `Alloc` blocks it is the padded payload size; for `Mapped` blocks it
/// is the *unpadded* user-requested size, since a mapping's true length
/// is always recoverable by padding it back up. [`Block::footprint`]
/// hides that asymmetry from every call site that needs "how many bytes
/// does this block occupy".
#[repr(C)]
pub struct Block {
  pub size: usize,
  pub status: Status,
  pub prev: *mut Block,
  pub next: *mut Block,
}

/// Size in bytes of the `Block` header itself.
///
/// `repr(C)` plus two pointer fields already guarantees an 8-aligned,
/// 8-multiple size on every platform this crate targets, but carve and
/// split arithmetic below depends on that fact, so it's named here
/// explicitly rather than left implicit.
pub const HEADER_SIZE: usize = mem::size_of::<Block>();

impl Block {
  /// Writes a new header at `addr` and returns it as a raw pointer.
  ///
  /// # Safety
  /// `addr` must be a valid, writable, 8-aligned address with at least
  /// `HEADER_SIZE` bytes available and not currently aliased.
  pub unsafe fn write_at(addr: usize, size: usize, status: Status) -> *mut Block {
    let block = addr as *mut Block;
    unsafe {
      ptr::write(
        block,
        Block { size, status, prev: ptr::null_mut(), next: ptr::null_mut() },
      );
    }
    block
  }

  /// Address of this header.
  pub fn addr(this: *const Block) -> usize {
    this as usize
  }

  /// Address of the byte immediately following this block's occupied
  /// region (header + footprint). For arena blocks this is the address
  /// of the next block, if any — the arena is packed with no gaps.
  pub unsafe fn end_addr(this: *const Block) -> usize {
    unsafe { Block::addr(this) + HEADER_SIZE + (*this).footprint() }
  }

  /// Total bytes this block occupies after its header, per its status.
  ///
  /// Arena (`Free`/`Alloc`) blocks store the padded size directly.
  /// `Mapped` blocks store the unpadded user size and must be padded
  /// here to recover the real mapping length.
  pub unsafe fn footprint(&self) -> usize {
    match self.status {
      Status::Free | Status::Alloc => self.size,
      Status::Mapped => self.size + pad(self.size),
    }
  }

  /// The user-visible payload pointer for this block.
  pub unsafe fn payload_ptr(this: *mut Block) -> *mut u8 {
    unsafe { (this as *mut u8).add(HEADER_SIZE) }
  }

  /// Recovers the header pointer from a payload pointer previously
  /// returned by [`Block::payload_ptr`].
  ///
  /// # Safety
  /// `payload` must have been returned by this allocator and not yet
  /// freed.
  pub unsafe fn header_of(payload: *mut u8) -> *mut Block {
    unsafe { payload.sub(HEADER_SIZE) as *mut Block }
  }
}
