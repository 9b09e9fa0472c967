//! A `log` backend writing to a swappable stream.
//!
//! The allocator only speaks the `log` facade. Installing [`StreamLogger`] is
//! optional; any other backend works too.

use std::{
  io::{self, Write},
  sync::{
    Mutex,
    atomic::{AtomicBool, Ordering},
  },
};

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

static LOGGER: StreamLogger = StreamLogger::new();

pub struct StreamLogger {
  verbose: AtomicBool,
  destination: Mutex<Option<Box<dyn Write + Send>>>,
}

impl StreamLogger {
  pub const fn new() -> Self {
    Self {
      verbose: AtomicBool::new(false),
      destination: Mutex::new(None),
    }
  }

  pub fn set_verbose(
    &self,
    verbose: bool,
  ) {
    self.verbose.store(verbose, Ordering::Relaxed);
  }

  pub fn is_verbose(&self) -> bool {
    self.verbose.load(Ordering::Relaxed)
  }

  /// Replaces the stream records are written to. Standard error until set.
  pub fn set_destination(
    &self,
    destination: Box<dyn Write + Send>,
  ) {
    if let Ok(mut current) = self.destination.lock() {
      if let Some(previous) = current.as_mut() {
        let _ = previous.flush();
      }
      *current = Some(destination);
    }
  }

  fn threshold(&self) -> Level {
    if self.is_verbose() {
      Level::Trace
    } else {
      Level::Warn
    }
  }
}

impl Default for StreamLogger {
  fn default() -> Self {
    Self::new()
  }
}

impl Log for StreamLogger {
  fn enabled(
    &self,
    metadata: &Metadata,
  ) -> bool {
    metadata.level() <= self.threshold()
  }

  fn log(
    &self,
    record: &Record,
  ) {
    if !self.enabled(record.metadata()) {
      return;
    }

    let Ok(mut destination) = self.destination.lock() else {
      return;
    };

    let (level, target, args) = (record.level(), record.target(), record.args());

    // Write errors are dropped; logging must never fail the allocation path.
    let _ = match destination.as_mut() {
      Some(stream) => writeln!(stream, "[{level}] {target}: {args}"),
      None => writeln!(io::stderr(), "[{level}] {target}: {args}"),
    };
  }

  fn flush(&self) {
    if let Ok(mut destination) = self.destination.lock() {
      let _ = match destination.as_mut() {
        Some(stream) => stream.flush(),
        None => io::stderr().flush(),
      };
    }
  }
}

/// Installs the process-wide [`StreamLogger`].
pub fn init() -> Result<(), SetLoggerError> {
  log::set_logger(&LOGGER).map(|()| log::set_max_level(LevelFilter::Trace))
}

/// Toggles verbose output on the process-wide logger.
pub fn set_verbose(
  verbose: bool,
) {
  LOGGER.set_verbose(verbose);
}

/// Redirects the process-wide logger.
pub fn set_destination(
  destination: Box<dyn Write + Send>,
) {
  LOGGER.set_destination(destination);
}
