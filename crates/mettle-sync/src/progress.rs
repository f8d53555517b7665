//! Byte-count progress reporting for streaming reads.

use std::io::Read;

/// Wraps a [`Read`], invoking a callback with `(bytes_seen, total)` after
/// every read. Used while decompressing a pulled data layer so progress is
/// proportional to the layer's declared size.
pub struct ProgressReader<R, F> {
  inner:  R,
  total:  u64,
  seen:   u64,
  report: F,
}

impl<R: Read, F: FnMut(u64, u64)> ProgressReader<R, F> {
  pub fn new(inner: R, total: u64, report: F) -> Self {
    Self { inner, total, seen: 0, report }
  }
}

impl<R: Read, F: FnMut(u64, u64)> Read for ProgressReader<R, F> {
  fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
    let n = self.inner.read(buf)?;
    if n > 0 {
      self.seen = self.seen.saturating_add(n as u64);
      (self.report)(self.seen, self.total);
    }
    Ok(n)
  }
}

/// A reporter that logs at each decile of `total`.
pub(crate) fn decile_logger(what: &'static str) -> impl FnMut(u64, u64) {
  let mut last = 0u64;
  move |seen, total| {
    if total == 0 {
      return;
    }
    let decile = seen * 10 / total;
    if decile > last {
      last = decile;
      tracing::debug!(what, percent = decile * 10, "decompressing");
    }
  }
}
