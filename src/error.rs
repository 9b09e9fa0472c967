use std::io;

use thiserror::Error;

/// Failures surfaced to callers of the allocation entry points.
#[derive(Debug, Error)]
pub enum AllocError {
  /// A request for zero bytes. Never logged.
  #[error("zero-size allocation requested")]
  ZeroSize,

  #[error("{count} elements of {size} bytes overflow the address space")]
  SizeOverflow { count: usize, size: usize },

  /// The program break could not be moved far enough.
  #[error("out of memory: heap could not grow to cover {requested} bytes")]
  OutOfMemory { requested: usize },

  #[error("failed to reserve heap region")]
  Reserve(#[source] io::Error),
}

impl AllocError {
  pub fn is_out_of_memory(&self) -> bool {
    matches!(self, AllocError::OutOfMemory { .. })
  }
}

/// First invariant violation found while walking the block list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Corruption {
  #[error("head at offset {offset} does not sit on the low-water mark")]
  HeadMisplaced { offset: usize },

  #[error("block at offset {offset} expected at offset {expected}")]
  Gap { offset: usize, expected: usize },

  #[error("block at offset {offset} holds {size} bytes but only {capacity} capacity")]
  Overfull {
    offset: usize,
    size: usize,
    capacity: usize,
  },

  #[error("block at offset {offset} has a stale prev link")]
  BrokenLink { offset: usize },

  #[error("free blocks at offsets {left} and {right} were not coalesced")]
  Uncoalesced { left: usize, right: usize },

  #[error("tail does not match the last block in the list")]
  TailMismatch,

  #[error("blocks end at offset {end} but the high-water mark is at {high}")]
  WatermarkMismatch { end: usize, high: usize },
}
