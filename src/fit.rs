use std::{fmt, ptr, str::FromStr};

use crate::block::Block;

/// Policy for picking among several blocks that can hold a request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FitStrategy {
  /// First block in address order with enough room.
  #[default]
  FirstFit,
  /// Block with the least room that still suffices.
  BestFit,
  /// Block with the most room.
  WorstFit,
  /// First fit, resuming where the previous next-fit placement landed.
  NextFit,
}

impl FitStrategy {
  pub const ALL: [FitStrategy; 4] = [
    FitStrategy::FirstFit,
    FitStrategy::BestFit,
    FitStrategy::WorstFit,
    FitStrategy::NextFit,
  ];

  /// Maps a raw numeric selector (`0..=3`) to a strategy.
  pub fn from_selector(
    selector: u32,
  ) -> Option<Self> {
    Self::ALL.get(selector as usize).copied()
  }

  pub fn name(&self) -> &'static str {
    match self {
      FitStrategy::FirstFit => "first-fit",
      FitStrategy::BestFit => "best-fit",
      FitStrategy::WorstFit => "worst-fit",
      FitStrategy::NextFit => "next-fit",
    }
  }

  /// Finds a block with at least `needed` bytes of room, or null.
  ///
  /// `cursor` is only consulted by [`FitStrategy::NextFit`]; null means "start
  /// at the head".
  ///
  /// # Safety
  ///
  /// `head` and `cursor` must be null or point into a well-formed block list.
  pub(crate) unsafe fn find(
    &self,
    head: *mut Block,
    cursor: *mut Block,
    needed: usize,
  ) -> *mut Block {
    unsafe {
      match self {
        FitStrategy::FirstFit => first_fit(head, ptr::null_mut(), needed),
        FitStrategy::BestFit => ranked_fit(head, needed, |candidate, chosen| candidate < chosen),
        FitStrategy::WorstFit => ranked_fit(head, needed, |candidate, chosen| candidate > chosen),
        FitStrategy::NextFit => next_fit(head, cursor, needed),
      }
    }
  }
}

impl fmt::Display for FitStrategy {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized fit strategy {0:?}")]
pub struct UnknownStrategy(pub String);

impl FromStr for FitStrategy {
  type Err = UnknownStrategy;

  fn from_str(
    value: &str,
  ) -> Result<Self, Self::Err> {
    let normalized = value.trim().to_ascii_lowercase();
    let name = normalized
      .strip_suffix("-fit")
      .or_else(|| normalized.strip_suffix("_fit"))
      .or_else(|| normalized.strip_suffix("fit"))
      .unwrap_or(&normalized);

    match name {
      "first" => Ok(FitStrategy::FirstFit),
      "best" => Ok(FitStrategy::BestFit),
      "worst" => Ok(FitStrategy::WorstFit),
      "next" => Ok(FitStrategy::NextFit),
      _ => Err(UnknownStrategy(value.to_string())),
    }
  }
}

/// Scans from `start` to the tail; stops early when reaching `stop`.
unsafe fn first_fit(
  start: *mut Block,
  stop: *mut Block,
  needed: usize,
) -> *mut Block {
  unsafe {
    let mut current = start;

    while !current.is_null() && current != stop {
      if (*current).room() >= needed {
        return current;
      }
      current = (*current).next;
    }

    ptr::null_mut()
  }
}

/// Keeps the sufficient block that `prefer` ranks highest; ties go to the
/// lowest address.
unsafe fn ranked_fit(
  head: *mut Block,
  needed: usize,
  prefer: impl Fn(usize, usize) -> bool,
) -> *mut Block {
  unsafe {
    let mut chosen: *mut Block = ptr::null_mut();
    let mut chosen_room = 0;
    let mut current = head;

    while !current.is_null() {
      let room = (*current).room();

      if room >= needed && (chosen.is_null() || prefer(room, chosen_room)) {
        chosen = current;
        chosen_room = room;

        if room == needed && prefer(needed, needed + 1) {
          // Nothing can beat an exact fit when smaller is better.
          break;
        }
      }
      current = (*current).next;
    }

    chosen
  }
}

unsafe fn next_fit(
  head: *mut Block,
  cursor: *mut Block,
  needed: usize,
) -> *mut Block {
  unsafe {
    if cursor.is_null() {
      return first_fit(head, ptr::null_mut(), needed);
    }

    let found = first_fit(cursor, ptr::null_mut(), needed);
    if !found.is_null() {
      return found;
    }

    // Wrap around: everything before the cursor.
    first_fit(head, cursor, needed)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::block::HEADER_SIZE;

  /// Builds an address-ordered list of free blocks with the given capacities
  /// over `storage`.
  fn free_list(
    storage: &mut Vec<usize>,
    capacities: &[usize],
  ) -> Vec<*mut Block> {
    let words: usize = capacities
      .iter()
      .map(|capacity| (HEADER_SIZE + capacity) / std::mem::size_of::<usize>())
      .sum();
    storage.resize(words, 0);

    let mut blocks = Vec::new();
    let mut address = storage.as_mut_ptr() as *mut u8;
    let mut prev: *mut Block = ptr::null_mut();

    unsafe {
      for &capacity in capacities {
        let block = Block::write(address, Block::new(capacity, 0, prev, ptr::null_mut()));
        if !prev.is_null() {
          (*prev).next = block;
        }
        blocks.push(block);
        prev = block;
        address = Block::end(block);
      }
    }

    blocks
  }

  #[test]
  fn test_each_strategy_picks_its_block() {
    let mut storage = Vec::new();
    let blocks = free_list(&mut storage, &[16, 64, 32]);
    let head = blocks[0];

    unsafe {
      assert_eq!(FitStrategy::FirstFit.find(head, ptr::null_mut(), 8), blocks[0]);
      assert_eq!(FitStrategy::BestFit.find(head, ptr::null_mut(), 8), blocks[0]);
      assert_eq!(FitStrategy::WorstFit.find(head, ptr::null_mut(), 8), blocks[1]);
      assert_eq!(FitStrategy::BestFit.find(head, ptr::null_mut(), 24), blocks[2]);
      assert_eq!(FitStrategy::FirstFit.find(head, ptr::null_mut(), 24), blocks[1]);
      assert!(FitStrategy::WorstFit.find(head, ptr::null_mut(), 72).is_null());
    }
  }

  #[test]
  fn test_used_blocks_offer_only_their_slack() {
    let mut storage = Vec::new();
    let blocks = free_list(&mut storage, &[HEADER_SIZE + 64, 32]);
    let used = blocks[0];

    unsafe {
      (*used).size = 16;

      // 64 - 16 = 48 bytes of slack after the split header.
      assert_eq!(FitStrategy::WorstFit.find(blocks[0], ptr::null_mut(), 8), blocks[0]);
      assert_eq!(FitStrategy::BestFit.find(blocks[0], ptr::null_mut(), 8), blocks[1]);
      assert!(FitStrategy::FirstFit.find(blocks[0], ptr::null_mut(), 56).is_null());
    }
  }

  #[test]
  fn test_next_fit_resumes_and_wraps() {
    let mut storage = Vec::new();
    let blocks = free_list(&mut storage, &[32, 16, 32, 16]);
    let head = blocks[0];

    unsafe {
      assert_eq!(FitStrategy::NextFit.find(head, ptr::null_mut(), 24), blocks[0]);
      assert_eq!(FitStrategy::NextFit.find(head, blocks[1], 24), blocks[2]);
      assert_eq!(FitStrategy::NextFit.find(head, blocks[3], 24), blocks[0]);
      assert_eq!(FitStrategy::NextFit.find(head, blocks[2], 8), blocks[2]);
      assert!(FitStrategy::NextFit.find(head, blocks[1], 40).is_null());
    }
  }

  #[test]
  fn test_selectors_and_names() {
    assert_eq!(FitStrategy::from_selector(0), Some(FitStrategy::FirstFit));
    assert_eq!(FitStrategy::from_selector(3), Some(FitStrategy::NextFit));
    assert_eq!(FitStrategy::from_selector(4), None);

    assert_eq!("best".parse::<FitStrategy>(), Ok(FitStrategy::BestFit));
    assert_eq!("Worst-Fit".parse::<FitStrategy>(), Ok(FitStrategy::WorstFit));
    assert_eq!("next_fit".parse::<FitStrategy>(), Ok(FitStrategy::NextFit));
    assert_eq!(
      "buddy".parse::<FitStrategy>(),
      Err(UnknownStrategy("buddy".to_string()))
    );
    assert_eq!(FitStrategy::FirstFit.to_string(), "first-fit");
  }
}
