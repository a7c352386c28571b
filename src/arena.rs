//! Arena manager (component 3): lazy 128 KiB prealloc on first touch,
//! tail extension when the free-list policy can't satisfy a request in
//! place, and the one realloc-shrink case that gives memory back to
//! the OS.
//!
//! These are `impl<O: Os> Heap<O>` methods rather than free functions:
//! growing and shrinking the arena both need simultaneous access to
//! `used_list`, `free_list`, and the OS shim, which is exactly the
//! state `Heap` already owns.

use crate::align::pad;
use crate::block::{Block, HEADER_SIZE, Status};
use crate::os::{Os, os_fail};
use crate::{ARENA_INITIAL, Heap};

impl<O: Os> Heap<O> {
  /// Performs the one-shot 128 KiB prealloc the first time any
  /// arena-bound request arrives. No-op on every subsequent call.
  pub(crate) fn ensure_arena(&self) {
    if self.initialized.get() {
      return;
    }
    unsafe {
      let addr = self.os.sbrk(ARENA_INITIAL as isize).unwrap_or_else(|| os_fail("sbrk"));
      let block = Block::write_at(addr, ARENA_INITIAL - HEADER_SIZE, Status::Free);
      self.free.borrow_mut().insert(block);
    }
    self.initialized.set(true);
  }

  /// Extends the arena to satisfy a raw request of `n` bytes once
  /// best-fit has already failed. Returns the new `Alloc` block,
  /// already sized to `n + pad(n)` and installed in `used_list`.
  ///
  /// Reuses the arena's tail free block (extending it in place via
  /// `sbrk`) when one exists; otherwise appends a fresh block at the
  /// break. Contiguity (invariant 5) guarantees the address-maximal
  /// block across both lists is always the true arena tail, so there's
  /// no distinct "non-tail free block with slack" case to handle here.
  pub(crate) fn grow(&self, n: usize) -> *mut Block {
    let target = n + pad(n);

    let free_tail = self.free.borrow().tail();
    let used_tail = self.used.borrow().tail();

    let tail_is_free = match (free_tail.is_null(), used_tail.is_null()) {
      (true, _) => false,
      (false, true) => true,
      (false, false) => unsafe { Block::addr(free_tail) > Block::addr(used_tail) },
    };

    if tail_is_free {
      unsafe {
        // best_fit already rejected this block, so it's strictly
        // smaller than target: extend it exactly up to size.
        let delta = target - (*free_tail).size;
        self.os.sbrk(delta as isize).unwrap_or_else(|| os_fail("sbrk"));
        self.free.borrow_mut().remove(free_tail);
        (*free_tail).size = target;
        (*free_tail).status = Status::Alloc;
        self.used.borrow_mut().insert(free_tail);
        return free_tail;
      }
    }

    unsafe {
      let addr = self
        .os
        .sbrk((HEADER_SIZE + target) as isize)
        .unwrap_or_else(|| os_fail("sbrk"));
      let block = Block::write_at(addr, target, Status::Alloc);
      self.used.borrow_mut().insert(block);
      block
    }
  }

  /// Shrinks an arena-resident block to `target` padded payload bytes.
  ///
  /// When `block` is the arena's current tail, the freed trailing bytes
  /// are returned straight to the OS via `sbrk(-delta)` instead of
  /// becoming a free block — the one case where this allocator gives
  /// pages back at all. Otherwise a free
  /// remainder is split off in place. Below the split threshold,
  /// `block.size` is left untouched (internal fragmentation, not a
  /// bug — it's what lets a later grow-in-place reuse the slack for
  /// free, see `arena_grow_in_place`'s first case).
  pub(crate) fn arena_shrink(&self, block: *mut Block, target: usize) {
    unsafe {
      let remainder = (*block).size - target;
      if remainder < HEADER_SIZE + 1 {
        return;
      }

      let successor =
        crate::neighbour::successor(&self.free.borrow(), &self.used.borrow(), block);

      if successor.is_null() {
        self.os.sbrk(-(remainder as isize)).unwrap_or_else(|| os_fail("sbrk"));
        (*block).size = target;
        return;
      }

      let new_addr = Block::addr(block) + HEADER_SIZE + target;
      (*block).size = target;
      let new_block = Block::write_at(new_addr, remainder - HEADER_SIZE, Status::Free);
      self.free.borrow_mut().insert(new_block);
      crate::policy::coalesce(&mut self.free.borrow_mut());
    }
  }

  /// Attempts to grow an arena-resident block to `target` padded
  /// payload bytes without moving it. Returns whether it succeeded.
  pub(crate) fn arena_grow_in_place(&self, block: *mut Block, target: usize) -> bool {
    unsafe {
      let successor =
        crate::neighbour::successor(&self.free.borrow(), &self.used.borrow(), block);
      let is_tail = successor.is_null() || Block::addr(block) >= Block::addr(successor);

      if !successor.is_null()
        && Block::addr(block) + HEADER_SIZE + target <= Block::addr(successor)
      {
        (*block).size = target;
        return true;
      }

      if is_tail {
        let delta = target - (*block).size;
        self.os.sbrk(delta as isize).unwrap_or_else(|| os_fail("sbrk"));
        (*block).size = target;
        return true;
      }

      if (*successor).status == Status::Free {
        let extent = Block::addr(successor) + HEADER_SIZE + (*successor).size;
        let wanted = Block::addr(block) + HEADER_SIZE + target;
        if extent >= wanted {
          self.free.borrow_mut().remove(successor);
          let leftover = extent - wanted;
          (*block).size = target;
          if leftover >= HEADER_SIZE + 1 {
            let new_block = Block::write_at(wanted, leftover - HEADER_SIZE, Status::Free);
            self.free.borrow_mut().insert(new_block);
          } else {
            (*block).size += leftover;
          }
          return true;
        }
      }

      false
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::os::FakeOs;

  fn heap() -> Heap<FakeOs> {
    Heap::new(FakeOs::new(4 * 1024 * 1024))
  }

  // grow()'s first sub-path: the only free block is the arena's tail, so
  // best-fit's failure is resolved by sbrk-extending it in place rather
  // than appending a fresh block.
  #[test]
  fn grow_reuses_the_tail_free_block_via_sbrk() {
    let h = heap();
    let first = h.allocate(100);
    assert!(!first.is_null());

    let tail_size = unsafe { (*h.free.borrow().tail()).size };
    let big = tail_size + 1000;
    let second = h.allocate(big);
    assert!(!second.is_null());

    unsafe {
      let block = Block::header_of(second);
      assert_eq!((*block).status, Status::Alloc);
      assert_eq!((*block).size, big + pad(big));
    }
    // The old free tail was extended and promoted wholesale: no
    // remainder block is left behind.
    assert!(h.free.borrow().is_empty());
    assert_eq!(h.used.borrow().iter().count(), 2);
  }

  // grow()'s second sub-path: no free tail block exists at all (the
  // initial block was consumed exactly, with no split), so grow must
  // append a brand-new block at the break instead of reusing anything.
  #[test]
  fn grow_appends_a_fresh_block_when_no_free_tail_exists() {
    let h = heap();
    let full = h.allocate(ARENA_INITIAL - HEADER_SIZE);
    assert!(!full.is_null());
    assert!(h.free.borrow().is_empty());

    let second = h.allocate(50);
    assert!(!second.is_null());

    unsafe {
      let full_block = Block::header_of(full);
      let second_block = Block::header_of(second);
      assert_eq!((*second_block).status, Status::Alloc);
      assert_eq!((*second_block).size, 50 + pad(50));
      // Freshly appended means it sits immediately after `full`, not
      // reused from some nonexistent free block.
      assert_eq!(Block::addr(second_block), Block::end_addr(full_block));
    }
    assert!(h.free.borrow().is_empty());
    assert_eq!(h.used.borrow().iter().count(), 2);
  }

  // arena_shrink's "leave unchanged" branch: a remainder too small to
  // host a non-degenerate free block (`<= H + 1`) is left as internal
  // fragmentation rather than touched at all.
  #[test]
  fn arena_shrink_leaves_size_unchanged_when_remainder_is_too_small() {
    let h = heap();
    let full = h.allocate(ARENA_INITIAL - HEADER_SIZE);
    let original_size = unsafe { (*Block::header_of(full)).size };
    let target = original_size - HEADER_SIZE;

    let p = h.reallocate(full, target);
    assert_eq!(p, full);
    unsafe {
      let block = Block::header_of(p);
      assert_eq!((*block).size, original_size);
    }
  }

  // arena_shrink's split branch: a non-tail block (one with a live
  // successor) shrinks by splitting off a free remainder in place.
  #[test]
  fn arena_shrink_splits_off_a_free_remainder_when_not_the_tail() {
    let h = heap();
    let u = h.allocate(500);
    let v = h.allocate(64);
    let free_blocks_before = h.free.borrow().iter().count();

    let shrunk = h.reallocate(u, 50);
    assert_eq!(shrunk, u);

    unsafe {
      let u_block = Block::header_of(u);
      assert_eq!((*u_block).size, 50 + pad(50));
      let v_block = Block::header_of(v);
      assert_eq!((*v_block).status, Status::Alloc);
      assert_eq!((*v_block).size, 64 + pad(64));

      // A new free block, sized and placed exactly where the split
      // left it, now sits between the shrunk `u` and `v`.
      let free = h.free.borrow();
      assert_eq!(free.iter().count(), free_blocks_before + 1);
      let split = free.iter().find(|&b| Block::addr(b) == Block::end_addr(u_block)).unwrap();
      assert_eq!(Block::end_addr(split), Block::addr(v_block));
    }
  }

  // arena_shrink's tail branch: shrinking the arena's current tail
  // block (no successor in either list) gives the freed bytes back to
  // the OS via `sbrk(-delta)` instead of creating a free block.
  #[test]
  fn arena_shrink_returns_pages_to_the_os_when_block_is_the_tail() {
    let h = heap();
    let full = h.allocate(ARENA_INITIAL - HEADER_SIZE);
    let original_size = unsafe { (*Block::header_of(full)).size };
    let target = 104;
    let expected_delta = original_size - target;

    let break_before = unsafe { h.os.sbrk(0).unwrap() };
    let p = h.reallocate(full, 100);
    let break_after = unsafe { h.os.sbrk(0).unwrap() };

    assert_eq!(p, full);
    assert_eq!(break_before - break_after, expected_delta);
    unsafe {
      let block = Block::header_of(p);
      assert_eq!((*block).size, target);
    }
    assert!(h.free.borrow().is_empty());
  }
}
