// Copyright 2018-2026 the Deno authors. MIT license.

use parking_lot::Condvar;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
  Idle,
  Paused,
}

struct ResumeInner {
  resumed: Mutex<bool>,
  cond: Condvar,
}

/// Signal used to leave the message loop that runs while script execution
/// is paused.
///
/// The handle can be cloned and sent to other threads. Calling
/// [`ResumeHandle::resume`] from anywhere makes the pause loop exit after
/// its current iteration.
#[derive(Clone)]
pub struct ResumeHandle(Arc<ResumeInner>);

impl Default for ResumeHandle {
  fn default() -> Self {
    Self::new()
  }
}

impl ResumeHandle {
  pub fn new() -> Self {
    Self(Arc::new(ResumeInner {
      resumed: Mutex::new(true),
      cond: Condvar::new(),
    }))
  }

  /// Clears the signal on pause entry.
  pub(crate) fn arm(&self) {
    *self.0.resumed.lock() = false;
  }

  pub fn resume(&self) {
    let mut resumed = self.0.resumed.lock();
    *resumed = true;
    self.0.cond.notify_all();
  }

  pub fn is_resumed(&self) -> bool {
    *self.0.resumed.lock()
  }

  /// Blocks for at most `timeout` or until [`ResumeHandle::resume`] is
  /// called. Returns whether the signal is set.
  pub fn wait_for_resume(&self, timeout: Duration) -> bool {
    let mut resumed = self.0.resumed.lock();
    if !*resumed {
      self.0.cond.wait_for(&mut resumed, timeout);
    }
    *resumed
  }
}

impl std::fmt::Debug for ResumeHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ResumeHandle")
      .field("resumed", &self.is_resumed())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::thread;
  use std::time::Instant;

  #[test]
  fn starts_resumed_and_arms() {
    let handle = ResumeHandle::new();
    assert!(handle.is_resumed());
    handle.arm();
    assert!(!handle.is_resumed());
    handle.resume();
    assert!(handle.is_resumed());
  }

  #[test]
  fn wait_times_out_while_armed() {
    let handle = ResumeHandle::new();
    handle.arm();
    let start = Instant::now();
    assert!(!handle.wait_for_resume(Duration::from_millis(20)));
    assert!(start.elapsed() >= Duration::from_millis(20));
  }

  #[test]
  fn resume_from_another_thread_wakes_waiter() {
    let handle = ResumeHandle::new();
    handle.arm();
    let remote = handle.clone();
    let join = thread::spawn(move || {
      thread::sleep(Duration::from_millis(10));
      remote.resume();
    });
    let start = Instant::now();
    while !handle.wait_for_resume(Duration::from_secs(5)) {}
    assert!(start.elapsed() < Duration::from_secs(5));
    join.join().unwrap();
  }
}
