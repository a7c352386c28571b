use std::io::Read;

use brkalloc::{allocate, free, reallocate, zero_allocate};
use libc::sbrk;

/// Waits until the user presses ENTER. Useful for inspecting memory
/// state with tools like `pmap`, `htop`, or `gdb` between steps.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn main() {
  unsafe {
    print_program_break("start");
    block_until_enter_pressed();

    // --------------------------------------------------------------
    // 1) Allocate 100 bytes. Triggers the 128 KiB arena prealloc, then
    //    carves a 104-byte (padded) block off the front.
    // --------------------------------------------------------------
    let first = allocate(100);
    println!("\n[1] allocate(100) = {:?}", first);
    print_program_break("after first allocate");
    (first as *mut u8).write_bytes(0xAB, 100);
    block_until_enter_pressed();

    // --------------------------------------------------------------
    // 2) Allocate a second block, then free the first. Best-fit will
    //    now see a hole in the arena instead of only the tail.
    // --------------------------------------------------------------
    let second = allocate(256);
    println!("\n[2] allocate(256) = {:?}", second);
    free(first);
    println!("[2] freed first block at {:?}", first);
    block_until_enter_pressed();

    // --------------------------------------------------------------
    // 3) Allocate something that fits the hole left by `first` and
    //    watch best-fit reuse it instead of growing the arena.
    // --------------------------------------------------------------
    let third = allocate(80);
    println!(
      "\n[3] allocate(80) = {:?} (reused freed hole? {})",
      third,
      third == first
    );
    block_until_enter_pressed();

    // --------------------------------------------------------------
    // 4) Grow `second` past its current size. With nothing free
    //    after it, this extends the arena tail via sbrk.
    // --------------------------------------------------------------
    print_program_break("before grow");
    let grown = reallocate(second, 20_000);
    println!("\n[4] reallocate(second, 20_000) = {:?}", grown);
    print_program_break("after grow");
    block_until_enter_pressed();

    // --------------------------------------------------------------
    // 5) Zero-allocate a small array and confirm it reads back zero.
    // --------------------------------------------------------------
    let zeroed = zero_allocate(64, 4);
    println!("\n[5] zero_allocate(64, 4) = {:?}", zeroed);
    let all_zero = (0..256).all(|i| (zeroed as *mut u8).add(i).read() == 0);
    println!("[5] every byte zero? {all_zero}");
    block_until_enter_pressed();

    // --------------------------------------------------------------
    // 6) Allocate something large enough to route through mmap
    //    instead of the arena, then shrink it back down to observe
    //    migration back into the arena.
    // --------------------------------------------------------------
    let big = allocate(256 * 1024);
    println!("\n[6] allocate(256 KiB) = {:?} (mapped)", big);
    let migrated = reallocate(big, 64);
    println!("[6] reallocate(big, 64) = {:?} (migrated into arena)", migrated);
    block_until_enter_pressed();

    free(third);
    free(grown);
    free(zeroed);
    free(migrated);

    println!("\n[7] End of walkthrough. Process exit reclaims everything else.");
  }
}
