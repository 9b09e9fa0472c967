//! Sources of a program break the heap can grow into.

use std::{io, ptr, ptr::NonNull};

use libc::{c_void, intptr_t};

use crate::{align::checked_align, error::AllocError};

/// A contiguous region that only grows at its upper end.
pub trait ProgramBreak {
  /// The current break: first byte past the claimed region.
  fn current(&mut self) -> *mut u8;

  /// Moves the break up by exactly `increment` bytes and returns the previous
  /// break, or `None` without side effects when the region cannot grow.
  ///
  /// # Safety
  ///
  /// The caller owns every byte between the old and new break afterwards and
  /// must not assume anything about their contents.
  unsafe fn extend(
    &mut self,
    increment: usize,
  ) -> Option<NonNull<u8>>;

  /// Moves the break back down to `address`. Returns `false` if it refused.
  ///
  /// # Safety
  ///
  /// Nothing above `address` may be used once this returns `true`.
  unsafe fn shrink_to(
    &mut self,
    address: *mut u8,
  ) -> bool;
}

/// The process program break, driven through `sbrk(2)` and `brk(2)`.
///
/// Only one heap per process should use it; anything else in the process
/// moving the break (the system allocator included) is detected but not
/// prevented.
#[derive(Debug, Default)]
pub struct Sbrk {
  claimed: Option<NonNull<u8>>,
}

impl Sbrk {
  pub const fn new() -> Self {
    Self { claimed: None }
  }
}

impl ProgramBreak for Sbrk {
  fn current(&mut self) -> *mut u8 {
    unsafe { libc::sbrk(0) as *mut u8 }
  }

  unsafe fn extend(
    &mut self,
    increment: usize,
  ) -> Option<NonNull<u8>> {
    let increment = intptr_t::try_from(increment).ok()?;

    let previous = unsafe { libc::sbrk(increment) };

    if previous == usize::MAX as *mut c_void {
      return None;
    }

    let previous = NonNull::new(previous as *mut u8)?;
    self.claimed = NonNull::new(unsafe { previous.as_ptr().offset(increment) });

    Some(previous)
  }

  unsafe fn shrink_to(
    &mut self,
    address: *mut u8,
  ) -> bool {
    // The break is only ours to lower if nobody moved it after our last growth.
    if let Some(claimed) = self.claimed {
      if self.current() != claimed.as_ptr() {
        return false;
      }
    }

    if unsafe { libc::brk(address as *mut c_void) } != 0 {
      return false;
    }

    self.claimed = NonNull::new(address);
    true
  }
}

/// A private break simulated over an anonymous mapping of fixed size.
///
/// ```text
///   base              break                         base + capacity
///   ├─────────────────┼─────────────────────────────┤
///   │     claimed     │          reserved           │
///   └─────────────────┴─────────────────────────────┘
/// ```
///
/// Growing past the reservation fails the same way `sbrk` does once the OS
/// refuses, which makes out-of-memory paths reproducible.
#[derive(Debug)]
pub struct Reserved {
  base: NonNull<u8>,
  capacity: usize,
  offset: usize,
}

impl Reserved {
  pub fn new(
    capacity: usize,
  ) -> Result<Self, AllocError> {
    let capacity = checked_align(capacity.max(1))
      .ok_or_else(|| AllocError::Reserve(io::Error::from_raw_os_error(libc::ENOMEM)))?;

    let base = unsafe {
      libc::mmap(
        ptr::null_mut(),
        capacity,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if base == libc::MAP_FAILED {
      return Err(AllocError::Reserve(io::Error::last_os_error()));
    }

    let base = NonNull::new(base as *mut u8)
      .ok_or_else(|| AllocError::Reserve(io::Error::from_raw_os_error(libc::ENOMEM)))?;

    Ok(Self {
      base,
      capacity,
      offset: 0,
    })
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes currently claimed below the break.
  pub fn claimed(&self) -> usize {
    self.offset
  }
}

impl ProgramBreak for Reserved {
  fn current(&mut self) -> *mut u8 {
    unsafe { self.base.as_ptr().add(self.offset) }
  }

  unsafe fn extend(
    &mut self,
    increment: usize,
  ) -> Option<NonNull<u8>> {
    let end = self.offset.checked_add(increment)?;

    if end > self.capacity {
      return None;
    }

    let previous = self.current();
    self.offset = end;

    NonNull::new(previous)
  }

  unsafe fn shrink_to(
    &mut self,
    address: *mut u8,
  ) -> bool {
    let base = self.base.as_ptr() as usize;
    let address = address as usize;

    if address < base || address > base + self.offset {
      return false;
    }

    self.offset = address - base;
    true
  }
}

impl Drop for Reserved {
  fn drop(&mut self) {
    unsafe {
      libc::munmap(self.base.as_ptr() as *mut c_void, self.capacity);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_reserved_grows_contiguously() {
    let mut region = Reserved::new(256).unwrap();
    let start = region.current();

    unsafe {
      let first = region.extend(64).unwrap();
      let second = region.extend(32).unwrap();

      assert_eq!(first.as_ptr(), start);
      assert_eq!(second.as_ptr(), start.add(64));
      assert_eq!(region.current(), start.add(96));
    }

    assert_eq!(region.claimed(), 96);
  }

  #[test]
  fn test_reserved_refuses_to_overrun() {
    let mut region = Reserved::new(128).unwrap();

    unsafe {
      assert!(region.extend(100).is_some());
      assert!(region.extend(100).is_none());
      assert!(region.extend(usize::MAX).is_none());
    }

    assert_eq!(region.claimed(), 100);
  }

  #[test]
  fn test_reserved_shrinks_within_claim_only() {
    let mut region = Reserved::new(128).unwrap();
    let start = region.current();

    unsafe {
      region.extend(64).unwrap();

      assert!(!region.shrink_to(start.add(65)));
      assert!(region.shrink_to(start.add(16)));
      assert_eq!(region.claimed(), 16);
      assert!(region.shrink_to(start));
    }

    assert_eq!(region.claimed(), 0);
  }

  #[test]
  fn test_reserved_rejects_unalignable_capacity() {
    let err = Reserved::new(usize::MAX).unwrap_err();

    assert!(matches!(err, AllocError::Reserve(_)));
    assert!(!err.is_out_of_memory());
  }

  #[test]
  fn test_reserved_memory_is_writable() {
    let mut region = Reserved::new(64).unwrap();

    unsafe {
      let bytes = region.extend(64).unwrap().as_ptr();
      ptr::write_bytes(bytes, 0xAB, 64);

      for i in 0..64 {
        assert_eq!(*bytes.add(i), 0xAB);
      }
    }
  }
}
