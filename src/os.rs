//! OS shim seam (component 9, ambient test tooling).
//!
//! The core never calls `libc` directly; every `sbrk`/`mmap`/`munmap`
//! call goes through the [`Os`] trait. [`SystemOs`] is the production
//! implementation, calling those functions directly. The
//! `#[cfg(test)]` [`FakeOs`] backs an independent, in-process `Heap`
//! instance per test without touching the real process break.

use std::sync::OnceLock;

/// The operating-system primitives the heap core depends on.
///
/// All three memory calls report failure as `None`/`false` rather than
/// the raw sentinel values `sbrk`/`mmap`/`munmap` use, so the router
/// (component 6) never has to special-case pointer bit patterns.
pub trait Os {
  /// Mirrors `sbrk(increment)`. Returns the *previous* break address on
  /// success, `None` on the sentinel failure.
  unsafe fn sbrk(&self, increment: isize) -> Option<usize>;

  /// Mirrors an anonymous, private, read-write `mmap` of `len` bytes.
  /// Returns the mapping's base address on success.
  unsafe fn mmap(&self, len: usize) -> Option<usize>;

  /// Mirrors `munmap(addr, len)`. Returns whether the unmap succeeded.
  unsafe fn munmap(&self, addr: usize, len: usize) -> bool;

  /// The system's page size — zero-allocate's mmap threshold.
  fn page_size(&self) -> usize;
}

/// Terminates the process after a fatal, unrecoverable OS failure
/// (`sbrk`/`mmap`/`munmap` returning their sentinel). Mirrors glibc
/// malloc's own "print and abort" behaviour on corruption: no
/// `panic!`/unwinding across what is conceptually an FFI boundary, and
/// no partial list mutation is ever visible at this point since every
/// OS call in this crate runs before the list update it gates.
pub(crate) fn os_fail(op: &str) -> ! {
  eprintln!("brkalloc: fatal: {op} failed, heap state unrecoverable");
  std::process::abort();
}

/// Production [`Os`] implementation: direct `libc` syscalls.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOs;

impl Os for SystemOs {
  unsafe fn sbrk(&self, increment: isize) -> Option<usize> {
    unsafe {
      let prev = libc::sbrk(increment as libc::intptr_t);
      if prev == usize::MAX as *mut libc::c_void {
        None
      } else {
        Some(prev as usize)
      }
    }
  }

  unsafe fn mmap(&self, len: usize) -> Option<usize> {
    unsafe {
      let addr = libc::mmap(
        std::ptr::null_mut(),
        len as libc::size_t,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
        -1,
        0,
      );
      if addr == libc::MAP_FAILED {
        None
      } else {
        Some(addr as usize)
      }
    }
  }

  unsafe fn munmap(&self, addr: usize, len: usize) -> bool {
    unsafe { libc::munmap(addr as *mut libc::c_void, len as libc::size_t) == 0 }
  }

  fn page_size(&self) -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(|| unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize })
  }
}

#[cfg(test)]
pub use fake::FakeOs;
