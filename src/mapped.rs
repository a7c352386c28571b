//! Large-block mapper (component 5): every request at or above the
//! mmap threshold gets its own anonymous, private mapping instead of an
//! arena carve.

use crate::align::pad;
use crate::block::{Block, HEADER_SIZE, Status};
use crate::os::{Os, os_fail};

/// Maps a fresh region sized for `n` raw payload bytes.
///
/// The header records the *unpadded* `n` — unlike arena blocks, which
/// store the padded size directly (see `Block`'s doc comment). That
/// asymmetry is what lets [`free`] recompute the exact mapping length
/// to hand back to `munmap` via [`Block::footprint`].
///
/// # Safety
/// `os` must be the same `Os` implementation this block is later freed
/// through.
pub(crate) unsafe fn allocate(os: &impl Os, n: usize) -> *mut Block {
  let len = HEADER_SIZE + n + pad(n);
  unsafe {
    let addr = os.mmap(len).unwrap_or_else(|| os_fail("mmap"));
    Block::write_at(addr, n, Status::Mapped)
  }
}

/// Unmaps a previously mapped block.
///
/// # Safety
/// `block` must currently be `Mapped` and not already unmapped.
pub(crate) unsafe fn free(os: &impl Os, block: *mut Block) {
  unsafe {
    let len = HEADER_SIZE + (*block).footprint();
    if !os.munmap(Block::addr(block), len) {
      os_fail("munmap");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::os::FakeOs;

  #[test]
  fn allocate_records_unpadded_size() {
    let os = FakeOs::new(4096);
    unsafe {
      let block = allocate(&os, 13);
      assert_eq!((*block).status, Status::Mapped);
      assert_eq!((*block).size, 13);
      assert_eq!((*block).footprint(), 16);
    }
  }

  #[test]
  fn free_unmaps_using_the_padded_footprint() {
    let os = FakeOs::new(4096);
    unsafe {
      let block = allocate(&os, 200);
      let addr = Block::addr(block);
      free(&os, block);
      // A second unmap at the same address must fail: it's gone.
      assert!(!os.munmap(addr, HEADER_SIZE + 200 + pad(200)));
    }
  }
}
