//! # fitalloc - A Free-List Heap Allocator
//!
//! This crate provides a **free-list allocator** that manages a single heap
//! region grown through the program break, with selectable placement
//! strategies, block splitting and coalescing on release.
//!
//! ## Overview
//!
//! All bookkeeping lives inside the heap itself. Each block starts with a
//! header linking it to its address neighbours, so the block list *is* the
//! memory layout:
//!
//! ```text
//!   low water mark                                             high water mark
//!   ┌──────┬────────────┬──────┬────────────────┬──────┬──────────┬──────┐
//!   │ hdr  │  A (used)  │ hdr  │    B (free)    │ hdr  │ C (used) │slack │
//!   └──────┴────────────┴──────┴────────────────┴──────┴──────────┴──────┘
//!      │  ▲                │  ▲                   │  ▲
//!      └──┼── next ───────►│  │                   │  │
//!         └──────── prev ──┘  └── pointer handed to the caller
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   fitalloc
//!   ├── align      - Alignment macro (align!) and checked rounding
//!   ├── block      - Block header layout (internal)
//!   ├── brk        - Program break sources (sbrk, reserved mapping)
//!   ├── heap       - HeapManager: watermarks, growth, reset
//!   ├── fit        - FitStrategy: first, best, worst and next fit
//!   ├── allocator  - FitAllocator: allocate, release, split, coalesce
//!   ├── inspect    - Block iteration, invariant checks, heap dump
//!   ├── config     - HeapConfig defaults
//!   ├── logger     - Stream backend for the `log` facade
//!   └── error      - AllocError and Corruption
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fitalloc::{FitAllocator, FitStrategy, Reserved};
//!
//! let mut allocator = FitAllocator::with_break(Reserved::new(1 << 20).unwrap());
//! allocator.set_fit_strategy(FitStrategy::BestFit);
//!
//! let bytes = allocator.allocate(64).unwrap();
//! unsafe {
//!     bytes.as_ptr().write_bytes(0x2A, 64);
//!     allocator.release(bytes.as_ptr());
//! }
//! ```
//!
//! ## How It Works
//!
//! An allocation first searches the list with the active strategy. A free
//! block big enough is reused in place; a used block with enough trailing
//! slack is split:
//!
//! ```text
//!   before:  │ hdr │ A │                 slack                 │
//!   after:   │ hdr │ A │ hdr │  new block  │       slack       │
//! ```
//!
//! When nothing fits, the heap grows by the smallest multiple of the growth
//! unit that covers header plus request, and a new block is appended.
//!
//! Releasing marks the block free and folds free neighbours into it until no
//! two adjacent blocks are free:
//!
//! ```text
//!   before:  │ free │ released │ free │
//!   after:   │            free        │
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: wrap the allocator in a mutex to share it
//! - **Whole-heap return only**: memory goes back to the OS on reset only
//! - **Word alignment**: payloads are aligned to the machine word, no more
//! - **Unix-only**: requires `libc` for `sbrk`, `brk` and `mmap`
//!
//! ## Safety
//!
//! Releasing and resizing take raw pointers and are `unsafe`: handing back a
//! pointer this allocator did not issue corrupts the heap.

pub mod align;
mod allocator;
mod block;
pub mod brk;
pub mod config;
mod error;
mod fit;
mod heap;
mod inspect;
pub mod logger;

pub use allocator::{FitAllocator, HeapStats};
pub use block::HEADER_SIZE;
pub use brk::{ProgramBreak, Reserved, Sbrk};
pub use config::HeapConfig;
pub use error::{AllocError, Corruption};
pub use fit::{FitStrategy, UnknownStrategy};
pub use heap::HeapManager;
pub use inspect::{BlockInfo, Blocks, HeapDump};
