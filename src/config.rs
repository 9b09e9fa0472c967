use crate::{block::HEADER_SIZE, fit::FitStrategy};

/// Growth unit used until configured otherwise.
pub const DEFAULT_GROWTH_UNIT: usize = 1024;

/// Floor a too-small growth unit is raised to (never below two headers).
pub const MIN_GROWTH_UNIT: usize = 64;

/// Smallest growth unit the heap accepts.
pub const fn safe_growth_unit() -> usize {
  if 2 * HEADER_SIZE > MIN_GROWTH_UNIT {
    2 * HEADER_SIZE
  } else {
    MIN_GROWTH_UNIT
  }
}

/// Initial settings for a [`FitAllocator`](crate::FitAllocator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  pub growth_unit: usize,
  pub strategy: FitStrategy,
  pub verbose: bool,
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self {
      growth_unit: DEFAULT_GROWTH_UNIT,
      strategy: FitStrategy::FirstFit,
      verbose: false,
    }
  }
}

impl HeapConfig {
  pub fn with_growth_unit(
    mut self,
    growth_unit: usize,
  ) -> Self {
    self.growth_unit = growth_unit;
    self
  }

  pub fn with_strategy(
    mut self,
    strategy: FitStrategy,
  ) -> Self {
    self.strategy = strategy;
    self
  }

  pub fn with_verbose(
    mut self,
    verbose: bool,
  ) -> Self {
    self.verbose = verbose;
    self
  }
}
