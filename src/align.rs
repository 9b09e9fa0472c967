use std::mem;

/// Alignment every block header (and therefore every payload) is placed at.
pub const WORD: usize = mem::align_of::<usize>();

/// Rounds a byte count up to the machine word.
///
/// # Examples
///
/// ```rust
/// use fitalloc::align;
///
/// match std::mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    (($value) + $crate::align::WORD - 1) & !($crate::align::WORD - 1)
  };
}

/// Same as [`align!`] but refuses values that would wrap past `isize::MAX`.
pub const fn checked_align(
  value: usize,
) -> Option<usize> {
  if value > isize::MAX as usize - WORD {
    return None;
  }
  Some(align!(value))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_align() {
    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (WORD * i + 1)..=(WORD * (i + 1));

      let expected_alignment = WORD * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
      }
    }
  }

  #[test]
  fn test_align_keeps_zero_and_multiples() {
    assert_eq!(align!(0), 0);
    assert_eq!(align!(WORD * 7), WORD * 7);
  }

  #[test]
  fn test_checked_align_rejects_huge_values() {
    assert_eq!(checked_align(1), Some(WORD));
    assert_eq!(checked_align(usize::MAX), None);
    assert_eq!(checked_align(isize::MAX as usize), None);
  }
}
