use std::sync::OnceLock;

use crate::error::Result;

/// A lazily computed scalar tied to the current spline.
///
/// Holding a value means it is valid; the value and its validity are set in a
/// single step, so readers never see a stale value paired with a fresh flag.
/// Mutations of the owning curve call [`CachedMetric::invalidate`], which
/// requires exclusive access.
#[derive(Debug, Clone, Default)]
pub(crate) struct CachedMetric {
    value: OnceLock<f64>,
}

impl CachedMetric {
    /// Returns the cached value, if valid.
    pub fn get(&self) -> Option<f64> {
        self.value.get().copied()
    }

    /// Returns the cached value or computes and stores it.
    ///
    /// A failed computation leaves the cache invalid.
    pub fn get_or_try_compute<F>(&self, compute: F) -> Result<f64>
    where
        F: FnOnce() -> Result<f64>,
    {
        if let Some(value) = self.value.get() {
            return Ok(*value);
        }
        let value = compute()?;
        Ok(*self.value.get_or_init(|| value))
    }

    /// Drops the cached value.
    pub fn invalidate(&mut self) {
        self.value.take();
    }
}
