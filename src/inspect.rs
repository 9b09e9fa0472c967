//! Read-only views of the block list: iteration, invariant checks and a
//! printable dump.

use std::{fmt, marker::PhantomData, ptr};

use crate::{
  align,
  allocator::FitAllocator,
  block::{Block, HEADER_SIZE},
  brk::ProgramBreak,
  error::Corruption,
};

/// Snapshot of one block header. `offset` is measured from the low-water mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  pub offset: usize,
  pub capacity: usize,
  pub size: usize,
}

impl BlockInfo {
  pub fn is_free(&self) -> bool {
    self.size == 0
  }

  /// Largest request this block could take without growing the heap.
  pub fn room(&self) -> usize {
    if self.is_free() {
      self.capacity
    } else {
      self
        .capacity
        .saturating_sub(align!(self.size) + HEADER_SIZE)
    }
  }
}

/// Walks the block list in address order.
pub struct Blocks<'a> {
  current: *mut Block,
  low_water_mark: usize,
  _heap: PhantomData<&'a Block>,
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<Self::Item> {
    if self.current.is_null() {
      return None;
    }

    unsafe {
      let block = &*self.current;
      self.current = block.next;

      Some(BlockInfo {
        offset: block as *const Block as usize - self.low_water_mark,
        capacity: block.capacity,
        size: block.size,
      })
    }
  }
}

impl<B: ProgramBreak> FitAllocator<B> {
  pub fn blocks(&self) -> Blocks<'_> {
    Blocks {
      current: self.head(),
      low_water_mark: self.heap().low_water_mark() as usize,
      _heap: PhantomData,
    }
  }

  /// Checks the structural invariants of the heap.
  ///
  /// Sizes never exceed capacities, blocks tile the region from the low to the
  /// high water mark with consistent back links, and no two neighbours are
  /// both free.
  pub fn validate(&self) -> Result<(), Corruption> {
    let heap = self.heap();
    let head = self.head();

    if head.is_null() {
      return match (self.tail().is_null(), heap.is_empty()) {
        (true, true) => Ok(()),
        _ => Err(Corruption::TailMismatch),
      };
    }

    if head as *mut u8 != heap.low_water_mark() {
      return Err(Corruption::HeadMisplaced {
        offset: heap.offset_of(head as *const u8),
      });
    }

    unsafe {
      let mut expected = heap.low_water_mark();
      let mut prev: *mut Block = ptr::null_mut();
      let mut current = head;

      while !current.is_null() {
        let offset = heap.offset_of(current as *const u8);
        let block = &*current;

        if current as *mut u8 != expected {
          return Err(Corruption::Gap {
            offset,
            expected: heap.offset_of(expected),
          });
        }

        if block.size > block.capacity {
          return Err(Corruption::Overfull {
            offset,
            size: block.size,
            capacity: block.capacity,
          });
        }

        if block.prev != prev {
          return Err(Corruption::BrokenLink { offset });
        }

        if !prev.is_null() && (*prev).is_free() && block.is_free() {
          return Err(Corruption::Uncoalesced {
            left: heap.offset_of(prev as *const u8),
            right: offset,
          });
        }

        expected = Block::end(current);
        prev = current;
        current = block.next;
      }

      if prev != self.tail() {
        return Err(Corruption::TailMismatch);
      }

      if expected != heap.high_water_mark() {
        return Err(Corruption::WatermarkMismatch {
          end: heap.offset_of(expected),
          high: heap.len(),
        });
      }
    }

    Ok(())
  }

  /// A printable listing of the heap. Rendering never touches the heap.
  pub fn dump(&self) -> HeapDump<'_, B> {
    HeapDump { allocator: self }
  }
}

pub struct HeapDump<'a, B: ProgramBreak> {
  allocator: &'a FitAllocator<B>,
}

impl<B: ProgramBreak> fmt::Display for HeapDump<'_, B> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    let heap = self.allocator.heap();

    writeln!(f, "heap map")?;
    writeln!(
      f,
      "  low water:  {:p}\n  high water: {:p}\n  length:     {} bytes\n  strategy:   {}",
      heap.low_water_mark(),
      heap.high_water_mark(),
      heap.len(),
      self.allocator.fit_strategy()
    )?;
    writeln!(
      f,
      "  {:>5}  {:>10}  {:>10}  {:>10}  {:>10}  state",
      "block", "offset", "data", "capacity", "size"
    )?;

    for (index, block) in self.allocator.blocks().enumerate() {
      writeln!(
        f,
        "  {:>5}  {:>#10x}  {:>#10x}  {:>10}  {:>10}  {}",
        index,
        block.offset,
        block.offset + HEADER_SIZE,
        block.capacity,
        block.size,
        if block.is_free() { "free" } else { "used" }
      )?;
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{brk::Reserved, config::HeapConfig};

  fn allocator() -> FitAllocator<Reserved> {
    FitAllocator::with_config(
      Reserved::new(1 << 16).unwrap(),
      HeapConfig::default().with_growth_unit(256),
    )
  }

  #[test]
  fn test_empty_heap_is_valid_and_has_no_blocks() {
    let allocator = allocator();

    assert_eq!(allocator.blocks().count(), 0);
    assert_eq!(allocator.validate(), Ok(()));
  }

  #[test]
  fn test_blocks_report_offsets_in_address_order() {
    let mut allocator = allocator();
    allocator.allocate(10).unwrap();
    allocator.allocate(300).unwrap();
    allocator.allocate(8).unwrap();

    let blocks: Vec<_> = allocator.blocks().collect();

    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0].offset, 0);
    assert_eq!(blocks[1].offset, HEADER_SIZE + align!(10));
    assert_eq!(blocks[2].offset, 256);
    assert!(blocks.windows(2).all(|pair| pair[0].offset < pair[1].offset));
  }

  #[test]
  fn test_validate_spots_uncoalesced_neighbours() {
    let mut allocator = allocator();
    let a = allocator.allocate(16).unwrap();
    let b = allocator.allocate(16).unwrap();
    allocator.allocate(16).unwrap();

    unsafe {
      (*Block::from_payload(a.as_ptr())).size = 0;
      (*Block::from_payload(b.as_ptr())).size = 0;
    }

    assert_eq!(
      allocator.validate(),
      Err(Corruption::Uncoalesced {
        left: 0,
        right: HEADER_SIZE + 16,
      })
    );
  }

  #[test]
  fn test_validate_spots_overfull_block() {
    let mut allocator = allocator();
    let a = allocator.allocate(16).unwrap();
    allocator.allocate(16).unwrap();

    unsafe { (*Block::from_payload(a.as_ptr())).size = 17 };

    assert_eq!(
      allocator.validate(),
      Err(Corruption::Overfull {
        offset: 0,
        size: 17,
        capacity: 16,
      })
    );
  }

  #[test]
  fn test_validate_spots_capacity_drift() {
    let mut allocator = allocator();
    let a = allocator.allocate(16).unwrap();

    unsafe { (*Block::from_payload(a.as_ptr())).capacity -= 8 };

    assert_eq!(
      allocator.validate(),
      Err(Corruption::WatermarkMismatch {
        end: 248,
        high: 256,
      })
    );
  }

  #[test]
  fn test_dump_lists_every_block_without_mutating() {
    let mut allocator = allocator();
    let a = allocator.allocate(24).unwrap();
    allocator.allocate(40).unwrap();
    unsafe { allocator.release(a.as_ptr()) };

    let before: Vec<_> = allocator.blocks().collect();
    let dump = allocator.dump().to_string();

    assert_eq!(allocator.blocks().collect::<Vec<_>>(), before);
    assert!(dump.starts_with("heap map\n"));
    assert!(dump.contains("length:     256 bytes"));
    assert!(dump.contains("strategy:   first-fit"));
    assert_eq!(dump.lines().filter(|line| line.ends_with("free")).count(), 1);
    assert_eq!(dump.lines().filter(|line| line.ends_with("used")).count(), 1);
  }
}
