use std::{ffi::CStr, ptr, ptr::NonNull};

use log::{debug, trace, warn};

use crate::{
  align::checked_align,
  block::{Block, HEADER_SIZE},
  brk::{ProgramBreak, Sbrk},
  config::HeapConfig,
  error::AllocError,
  fit::FitStrategy,
  heap::HeapManager,
  logger,
};

/// Counters describing what the allocator has done so far.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
  pub allocations: usize,
  pub releases: usize,
  pub double_frees: usize,
  pub growths: usize,
  pub resets: usize,
}

/// A free-list allocator living entirely inside the region it manages.
///
/// Every block header sits right before the bytes it governs and links to its
/// address neighbours, so the list order is the memory order:
///
/// ```text
///   ┌────────┬─────────┬────────┬───────────────┬────────┬──────┐
///   │ header │ payload │ header │  free space   │ header │ ...  │
///   └────────┴─────────┴────────┴───────────────┴────────┴──────┘
///   ▲ head                                               ▲ tail
/// ```
pub struct FitAllocator<B: ProgramBreak = Sbrk> {
  heap: HeapManager<B>,
  head: *mut Block,
  tail: *mut Block,
  cursor: *mut Block,
  strategy: FitStrategy,
  verbose: bool,
  stats: HeapStats,
}

impl FitAllocator<Sbrk> {
  /// An allocator over the process program break.
  pub fn new() -> Self {
    Self::with_break(Sbrk::new())
  }
}

impl Default for FitAllocator<Sbrk> {
  fn default() -> Self {
    Self::new()
  }
}

impl<B: ProgramBreak> FitAllocator<B> {
  pub fn with_break(
    brk: B,
  ) -> Self {
    Self::with_config(brk, HeapConfig::default())
  }

  pub fn with_config(
    brk: B,
    config: HeapConfig,
  ) -> Self {
    if config.verbose {
      logger::set_verbose(true);
    }

    Self {
      heap: HeapManager::new(brk, config.growth_unit),
      head: ptr::null_mut(),
      tail: ptr::null_mut(),
      cursor: ptr::null_mut(),
      strategy: config.strategy,
      verbose: config.verbose,
      stats: HeapStats::default(),
    }
  }

  /// Hands out at least `size` contiguous bytes.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    if self.verbose {
      trace!("allocate entry: size = {size}");
    }

    if size == 0 {
      return Err(AllocError::ZeroSize);
    }

    let footprint = checked_align(size).ok_or(AllocError::OutOfMemory { requested: size })?;

    unsafe {
      let block = if self.head.is_null() {
        self.format_first(size, footprint)?
      } else {
        let candidate = self.strategy.find(self.head, self.cursor, footprint);

        if candidate.is_null() {
          self.append(size, footprint)?
        } else {
          self.place(candidate, size)
        }
      };

      if self.strategy == FitStrategy::NextFit {
        self.cursor = block;
      }
      self.stats.allocations += 1;

      if self.verbose {
        debug!(
          "allocated {size} bytes at offset {} ({})",
          self.heap.offset_of(block as *const u8),
          self.strategy
        );
      }

      Ok(NonNull::new_unchecked(Block::payload(block)))
    }
  }

  /// Returns a block to the heap and merges it with free neighbours.
  ///
  /// Releasing an already free block is reported and otherwise ignored.
  ///
  /// # Safety
  ///
  /// `address` must be null or a pointer returned by this allocator since its
  /// last reset.
  pub unsafe fn release(
    &mut self,
    address: *mut u8,
  ) {
    if self.verbose {
      trace!("release entry: {address:?}");
    }

    if address.is_null() {
      return;
    }

    unsafe {
      let block = Block::from_payload(address);

      if (*block).is_free() {
        self.stats.double_frees += 1;
        warn!(
          "double free of block at offset {} ignored",
          self.heap.offset_of(block as *const u8)
        );
        return;
      }

      (*block).size = 0;
      self.stats.releases += 1;
      self.coalesce(block);
    }
  }

  /// Gives the whole heap back to the program break.
  pub fn reset_heap(&mut self) {
    if self.verbose {
      trace!("reset entry");
    }

    if self.heap.is_empty() {
      return;
    }

    self.heap.reset();
    self.head = ptr::null_mut();
    self.tail = ptr::null_mut();
    self.cursor = ptr::null_mut();
    self.stats.resets += 1;
  }

  /// Sets the minimum growth size; `0` only queries. Returns the value in
  /// effect.
  pub fn set_growth_unit(
    &mut self,
    size: usize,
  ) -> usize {
    self.heap.set_growth_unit(size)
  }

  pub fn set_fit_strategy(
    &mut self,
    strategy: FitStrategy,
  ) {
    self.strategy = strategy;

    if self.verbose {
      debug!("{strategy} selected");
    }
  }

  /// Selects a strategy by its numeric selector, falling back to first-fit
  /// for unknown values. Returns the strategy now in effect.
  pub fn set_fit_selector(
    &mut self,
    selector: u32,
  ) -> FitStrategy {
    let strategy = FitStrategy::from_selector(selector).unwrap_or_else(|| {
      warn!("fit strategy {selector} not recognized, using first-fit");
      FitStrategy::FirstFit
    });

    self.set_fit_strategy(strategy);
    strategy
  }

  pub fn fit_strategy(&self) -> FitStrategy {
    self.strategy
  }

  /// Turns operation tracing on or off, here and on the stream logger.
  pub fn set_verbose(
    &mut self,
    verbose: bool,
  ) {
    self.verbose = verbose;
    logger::set_verbose(verbose);

    if verbose {
      debug!("verbose enabled");
    }
  }

  /// Redirects the stream logger. Only effective once [`logger::init`] ran.
  pub fn set_log_destination(
    &mut self,
    destination: Box<dyn std::io::Write + Send>,
  ) {
    logger::set_destination(destination);
  }

  pub fn stats(&self) -> HeapStats {
    self.stats
  }

  pub fn heap(&self) -> &HeapManager<B> {
    &self.heap
  }

  pub(crate) fn head(&self) -> *mut Block {
    self.head
  }

  pub(crate) fn tail(&self) -> *mut Block {
    self.tail
  }

  /// Allocates `count * size` bytes and zeroes them.
  pub fn allocate_zeroed(
    &mut self,
    count: usize,
    size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    if self.verbose {
      trace!("allocate_zeroed entry: {count} x {size}");
    }

    let total = count
      .checked_mul(size)
      .ok_or(AllocError::SizeOverflow { count, size })?;

    let address = self.allocate(total)?;
    unsafe { ptr::write_bytes(address.as_ptr(), 0, total) };

    Ok(address)
  }

  /// Changes the size of an allocation, moving it only when its block is too
  /// small.
  ///
  /// A null `address` allocates. A `new_size` of zero releases and returns
  /// `None`. On failure the original allocation is left untouched.
  ///
  /// # Safety
  ///
  /// Same contract as [`FitAllocator::release`].
  pub unsafe fn resize(
    &mut self,
    address: *mut u8,
    new_size: usize,
  ) -> Result<Option<NonNull<u8>>, AllocError> {
    if self.verbose {
      trace!("resize entry: {address:?} to {new_size}");
    }

    if address.is_null() {
      return self.allocate(new_size).map(Some);
    }

    if new_size == 0 {
      unsafe { self.release(address) };
      return Ok(None);
    }

    unsafe {
      let block = Block::from_payload(address);
      let old_size = (*block).size;

      if checked_align(new_size).is_some_and(|footprint| footprint <= (*block).capacity) {
        (*block).size = new_size;
        return Ok(NonNull::new(address));
      }

      let moved = self.allocate(new_size)?;
      ptr::copy_nonoverlapping(address, moved.as_ptr(), old_size.min(new_size));
      self.release(address);

      Ok(Some(moved))
    }
  }

  /// Copies a C string, terminator included, into a fresh allocation.
  pub fn duplicate_str(
    &mut self,
    text: &CStr,
  ) -> Result<NonNull<u8>, AllocError> {
    if self.verbose {
      trace!("duplicate_str entry");
    }

    let bytes = text.to_bytes_with_nul();
    let address = self.allocate(bytes.len())?;

    unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), address.as_ptr(), bytes.len()) };

    Ok(address)
  }

  /// Claims the first span of an empty heap and formats it as the only block.
  unsafe fn format_first(
    &mut self,
    size: usize,
    footprint: usize,
  ) -> Result<*mut Block, AllocError> {
    let (start, amount) = self.heap.grow(HEADER_SIZE + footprint)?;
    self.stats.growths += 1;

    let block = unsafe {
      Block::write(
        start.as_ptr(),
        Block::new(amount - HEADER_SIZE, size, ptr::null_mut(), ptr::null_mut()),
      )
    };

    self.head = block;
    self.tail = block;

    Ok(block)
  }

  /// Grows the heap and links a new block after the tail.
  unsafe fn append(
    &mut self,
    size: usize,
    footprint: usize,
  ) -> Result<*mut Block, AllocError> {
    let (start, amount) = self.heap.grow(HEADER_SIZE + footprint)?;
    self.stats.growths += 1;

    unsafe {
      let block = Block::write(
        start.as_ptr(),
        Block::new(amount - HEADER_SIZE, size, self.tail, ptr::null_mut()),
      );

      (*self.tail).next = block;
      self.tail = block;

      Ok(block)
    }
  }

  /// Puts `size` bytes into `candidate`: in place when it is free, otherwise
  /// in a new block carved from its trailing slack.
  ///
  /// ```text
  ///   before: │ hdr │ payload │          slack           │ next
  ///   after:  │ hdr │ payload │ hdr │ new payload │ slack │ next
  /// ```
  unsafe fn place(
    &mut self,
    candidate: *mut Block,
    size: usize,
  ) -> *mut Block {
    unsafe {
      if (*candidate).is_free() {
        (*candidate).size = size;
        return candidate;
      }

      let used = (*candidate).footprint();
      let next = (*candidate).next;

      let block = Block::write(
        Block::payload(candidate).add(used),
        Block::new(
          (*candidate).capacity - used - HEADER_SIZE,
          size,
          candidate,
          next,
        ),
      );

      if next.is_null() {
        self.tail = block;
      } else {
        (*next).prev = block;
      }

      (*candidate).next = block;
      (*candidate).capacity = used;

      block
    }
  }

  /// Merges a freshly freed block with free neighbours on both sides until
  /// none is left.
  unsafe fn coalesce(
    &mut self,
    mut block: *mut Block,
  ) {
    unsafe {
      loop {
        let next = (*block).next;
        if !next.is_null() && (*next).is_free() {
          self.absorb(block, next);
          continue;
        }

        let prev = (*block).prev;
        if !prev.is_null() && (*prev).is_free() {
          self.absorb(prev, block);
          block = prev;
          continue;
        }

        break;
      }
    }
  }

  /// Folds `right` (header included) into `left`, its lower neighbour.
  unsafe fn absorb(
    &mut self,
    left: *mut Block,
    right: *mut Block,
  ) {
    unsafe {
      (*left).capacity += HEADER_SIZE + (*right).capacity;
      (*left).next = (*right).next;

      if (*right).next.is_null() {
        self.tail = left;
      } else {
        (*(*right).next).prev = left;
      }

      if self.cursor == right {
        self.cursor = left;
      }
    }
  }
}
