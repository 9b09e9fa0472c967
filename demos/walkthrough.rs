use std::{io::Read, ptr};

use fitalloc::{FitAllocator, FitStrategy, logger};
use libc::sbrk;

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `gdb`,
/// or just watch the program break move between steps.
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
  let _ = logger::init();

  let mut allocator = FitAllocator::new();
  allocator.set_verbose(true);
  allocator.set_growth_unit(4096);

  unsafe {
    print_program_break("start");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 1) The first allocation grows the heap by one whole growth unit.
    // --------------------------------------------------------------------
    let first = allocator.allocate(4).unwrap();
    first.as_ptr().cast::<u32>().write(0xDEADBEEF);
    println!("\n[1] Allocate u32 at {:?}", first);
    print_program_break("after first alloc");
    print!("{}", allocator.dump());
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Further small allocations are carved from the first block's slack.
    // --------------------------------------------------------------------
    let second = allocator.allocate(12).unwrap();
    ptr::write_bytes(second.as_ptr(), 0xAB, 12);
    let third = allocator.allocate(64).unwrap();
    println!("\n[2] Allocate [u8; 12] at {:?} and [u8; 64] at {:?}", second, third);
    print_program_break("break unchanged");
    print!("{}", allocator.dump());
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) Releasing neighbours merges them back into one free block.
    // --------------------------------------------------------------------
    allocator.release(first.as_ptr());
    allocator.release(second.as_ptr());
    println!("\n[3] Released the first two blocks");
    print!("{}", allocator.dump());
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Releasing twice is reported, not fatal.
    // --------------------------------------------------------------------
    allocator.release(second.as_ptr());
    println!("\n[4] Double free counted: {}", allocator.stats().double_frees);
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) Best fit picks the tightest free block.
    // --------------------------------------------------------------------
    allocator.set_fit_strategy(FitStrategy::BestFit);
    let reused = allocator.allocate(2).unwrap();
    println!(
      "\n[5] fifth allocation == first? {}",
      if reused == first {
        "Yes, it reused the freed block"
      } else {
        "No, it allocated somewhere else"
      }
    );
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 6) A large request moves the program break.
    // --------------------------------------------------------------------
    print_program_break("before large alloc");
    let big = allocator.allocate(64 * 1024).unwrap();
    println!("\n[6] Allocate 64 KiB at {:?}", big);
    print_program_break("after large alloc");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 7) Reset hands the whole heap back to the OS.
    // --------------------------------------------------------------------
    allocator.reset_heap();
    print_program_break("after reset");
    println!("\n[7] {:?}", allocator.stats());
  }
}
