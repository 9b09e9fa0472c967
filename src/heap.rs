use std::ptr::{self, NonNull};

use log::{debug, warn};

use crate::{
  align,
  align::{WORD, checked_align},
  block::HEADER_SIZE,
  brk::ProgramBreak,
  config::safe_growth_unit,
  error::AllocError,
};

/// Owns the single region claimed from a [`ProgramBreak`].
///
/// ```text
///   low_water_mark                          high_water_mark
///   ├──────────┬──────────────┬──────────────┤
///   │ block 0  │   block 1    │   block 2    │  (program break)
///   └──────────┴──────────────┴──────────────┘
///              ◄── grows in multiples of growth_unit ──►
/// ```
pub struct HeapManager<B: ProgramBreak> {
  brk: B,
  low_water_mark: *mut u8,
  high_water_mark: *mut u8,
  growth_unit: usize,
}

impl<B: ProgramBreak> HeapManager<B> {
  pub fn new(
    brk: B,
    growth_unit: usize,
  ) -> Self {
    let mut heap = Self {
      brk,
      low_water_mark: ptr::null_mut(),
      high_water_mark: ptr::null_mut(),
      growth_unit: safe_growth_unit(),
    };
    heap.set_growth_unit(growth_unit);
    heap
  }

  /// Sets the minimum number of bytes claimed per growth and returns the
  /// value in effect. Zero only queries.
  ///
  /// Units too small for two headers are raised to a safe minimum; every unit
  /// is rounded up to the header alignment.
  pub fn set_growth_unit(
    &mut self,
    size: usize,
  ) -> usize {
    if size == 0 {
      return self.growth_unit;
    }

    let size = if size < 2 * HEADER_SIZE {
      let clamped = safe_growth_unit();
      warn!("growth unit {size} cannot hold two headers, using {clamped}");
      clamped
    } else {
      size
    };

    self.growth_unit = checked_align(size).unwrap_or(isize::MAX as usize & !(WORD - 1));
    self.growth_unit
  }

  pub fn growth_unit(&self) -> usize {
    self.growth_unit
  }

  /// Smallest multiple of the growth unit covering `needed` bytes.
  pub fn growth_for(
    &self,
    needed: usize,
  ) -> Option<usize> {
    let amount = needed
      .div_ceil(self.growth_unit)
      .max(1)
      .checked_mul(self.growth_unit)?;

    (amount <= isize::MAX as usize).then_some(amount)
  }

  /// Extends the region by enough whole growth units to cover `needed` bytes.
  ///
  /// Returns the start of the new span (the previous high-water mark) and its
  /// length. On failure nothing changes.
  pub fn grow(
    &mut self,
    needed: usize,
  ) -> Result<(NonNull<u8>, usize), AllocError> {
    let amount = self
      .growth_for(needed)
      .ok_or(AllocError::OutOfMemory { requested: needed })?;

    unsafe {
      let origin = self.brk.current();

      if self.is_empty() {
        let padding = align!(origin as usize) - origin as usize;
        if padding > 0 && self.brk.extend(padding).is_none() {
          return Err(AllocError::OutOfMemory { requested: needed });
        }
      }

      let Some(start) = self.brk.extend(amount) else {
        self.brk.shrink_to(origin);
        return Err(AllocError::OutOfMemory { requested: needed });
      };

      if !self.is_empty() && start.as_ptr() != self.high_water_mark {
        warn!(
          "program break moved by another party ({:?} != {:?}), refusing to grow",
          start.as_ptr(),
          self.high_water_mark
        );
        self.brk.shrink_to(start.as_ptr());
        return Err(AllocError::OutOfMemory { requested: needed });
      }

      if self.is_empty() {
        self.low_water_mark = start.as_ptr();
      }
      self.high_water_mark = start.as_ptr().add(amount);

      debug!(
        "heap grew by {amount} bytes to {} ({:?}..{:?})",
        self.len(),
        self.low_water_mark,
        self.high_water_mark
      );

      Ok((start, amount))
    }
  }

  /// Hands the whole region back to the break and forgets it.
  pub fn reset(&mut self) {
    if self.is_empty() {
      return;
    }

    debug!("resetting {} bytes of heap space", self.len());

    if !unsafe { self.brk.shrink_to(self.low_water_mark) } {
      warn!("program break moved by another party, heap space left claimed");
    }

    self.low_water_mark = ptr::null_mut();
    self.high_water_mark = ptr::null_mut();
  }

  pub fn is_empty(&self) -> bool {
    self.low_water_mark.is_null()
  }

  /// Bytes between the watermarks.
  pub fn len(&self) -> usize {
    self.high_water_mark as usize - self.low_water_mark as usize
  }

  pub fn low_water_mark(&self) -> *mut u8 {
    self.low_water_mark
  }

  pub fn high_water_mark(&self) -> *mut u8 {
    self.high_water_mark
  }

  /// Offset of `address` from the low-water mark.
  pub fn offset_of(
    &self,
    address: *const u8,
  ) -> usize {
    address as usize - self.low_water_mark as usize
  }

  pub fn source(&self) -> &B {
    &self.brk
  }
}
