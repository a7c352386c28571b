//! Neighbour locator (component 8): finds the lowest-addressed block
//! strictly greater than a given block's address, across both lists.
//!
//! A natural first-draft description of this search ends up with two
//! branches that return the same value no matter which is taken;
//! rather than reproduce that, this walks both lists directly and
//! keeps the smallest-addressed candidate above `of`, falling out to
//! null when there is none — i.e. `of` is the arena's final block.

use std::ptr;

use crate::block::Block;
use crate::list::BlockList;

/// Returns the block with the smallest address strictly greater than
/// `of`'s address, searching both `free` and `used`. Null means `of` is
/// the arena's current tail.
///
/// # Safety
/// Every block reachable from `free` or `used` must be a live, readable
/// header.
pub(crate) unsafe fn successor(free: &BlockList, used: &BlockList, of: *mut Block) -> *mut Block {
  let addr = Block::addr(of);
  let mut best: *mut Block = ptr::null_mut();

  unsafe {
    for list in [free, used] {
      for candidate in list.iter() {
        if ptr::eq(candidate, of) {
          continue;
        }
        let candidate_addr = Block::addr(candidate);
        if candidate_addr > addr && (best.is_null() || candidate_addr < Block::addr(best)) {
          best = candidate;
        }
      }
    }
  }

  best
}
