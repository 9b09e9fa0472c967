use std::{mem, ptr};

use crate::align;

/// Bytes taken by every block header.
pub const HEADER_SIZE: usize = mem::size_of::<Block>();

/// Header placed immediately before the bytes it governs.
///
/// `capacity` excludes the header itself and covers the payload plus any
/// trailing slack. `size == 0` marks the block as free. `next` and `prev` link
/// the address-adjacent headers, so walking the list is walking the heap.
#[repr(C)]
pub struct Block {
  pub capacity: usize,
  pub size: usize,
  pub next: *mut Block,
  pub prev: *mut Block,
}

impl Block {
  pub fn new(
    capacity: usize,
    size: usize,
    prev: *mut Block,
    next: *mut Block,
  ) -> Self {
    Self {
      capacity,
      size,
      next,
      prev,
    }
  }

  /// Formats a header at `address` and returns it as a block pointer.
  ///
  /// # Safety
  ///
  /// `address` must be word aligned and valid for `HEADER_SIZE` bytes of writes.
  pub unsafe fn write(
    address: *mut u8,
    block: Block,
  ) -> *mut Block {
    let header = address as *mut Block;
    unsafe { ptr::write(header, block) };
    header
  }

  /// Recovers the header owning a payload pointer.
  ///
  /// # Safety
  ///
  /// `payload` must have been produced by [`Block::payload`].
  pub unsafe fn from_payload(
    payload: *mut u8,
  ) -> *mut Block {
    unsafe { payload.sub(HEADER_SIZE) as *mut Block }
  }

  /// First byte handed to the caller.
  ///
  /// # Safety
  ///
  /// `block` must point at a live header.
  pub unsafe fn payload(
    block: *mut Block,
  ) -> *mut u8 {
    unsafe { (block as *mut u8).add(HEADER_SIZE) }
  }

  /// First byte past this block's capacity, i.e. where the next header sits.
  ///
  /// # Safety
  ///
  /// `block` must point at a live header.
  pub unsafe fn end(
    block: *mut Block,
  ) -> *mut u8 {
    unsafe { Block::payload(block).add((*block).capacity) }
  }

  pub fn is_free(&self) -> bool {
    self.size == 0
  }

  /// Bytes the payload actually occupies once rounded to the header alignment.
  pub fn footprint(&self) -> usize {
    align!(self.size)
  }

  /// Largest payload this block can accept without growing the heap.
  ///
  /// A free block is reused in place, so its whole capacity counts. A used
  /// block can only donate the slack behind its payload, minus the header the
  /// split will carve.
  pub fn room(&self) -> usize {
    if self.is_free() {
      self.capacity
    } else {
      self
        .capacity
        .saturating_sub(self.footprint() + HEADER_SIZE)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::align::WORD;

  #[test]
  fn test_header_is_word_aligned() {
    assert_eq!(HEADER_SIZE % WORD, 0);
    assert_eq!(mem::align_of::<Block>(), WORD);
  }

  #[test]
  fn test_room_of_free_block_is_its_capacity() {
    let block = Block::new(64, 0, ptr::null_mut(), ptr::null_mut());

    assert!(block.is_free());
    assert_eq!(block.room(), 64);
  }

  #[test]
  fn test_room_of_used_block_excludes_payload_and_header() {
    let block = Block::new(HEADER_SIZE + 64, 3, ptr::null_mut(), ptr::null_mut());

    assert!(!block.is_free());
    assert_eq!(block.footprint(), WORD);
    assert_eq!(block.room(), 64 - WORD);

    let full = Block::new(WORD, 3, ptr::null_mut(), ptr::null_mut());
    assert_eq!(full.room(), 0);
  }

  #[test]
  fn test_payload_round_trip() {
    let mut storage = [0usize; 16];

    unsafe {
      let block = Block::write(
        storage.as_mut_ptr() as *mut u8,
        Block::new(8 * WORD, 1, ptr::null_mut(), ptr::null_mut()),
      );
      let payload = Block::payload(block);

      assert_eq!(payload as usize - block as usize, HEADER_SIZE);
      assert_eq!(Block::from_payload(payload), block);
      assert_eq!(Block::end(block) as usize - payload as usize, 8 * WORD);
    }
  }
}
