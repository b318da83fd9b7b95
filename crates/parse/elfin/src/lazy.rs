//! Compute-once cells for lazily parsed ELF structures.
//!
//! Provides [`LazyCache`], a single-threaded memo slot: the first successful
//! access stores its value, every later access returns the stored value
//! without running the producer again.

use core::cell::OnceCell;
use core::fmt;

/// A value that is produced on first access and then cached forever.
///
/// Unlike `core::cell::LazyCell`, the producer is supplied at access time
/// and may fail. A failed producer leaves the slot empty, so the next
/// access runs it again and fails the same way; only successes are cached.
///
/// The cell is `!Sync`. Anything holding one (every parsed ELF entity) can
/// be moved between threads but not shared across them until it is dropped,
/// which rules out racing first accesses at compile time.
pub struct LazyCache<T> {
    cell: OnceCell<T>,
}

impl<T> LazyCache<T> {
    /// Creates an empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Returns the cached value, if any, without producing it.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    /// Returns `true` once a value has been stored.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Returns the cached value, producing it with `produce` if the slot is
    /// still empty.
    ///
    /// # Errors
    ///
    /// Propagates the producer's error; nothing is cached in that case.
    pub fn get_or_try_init<E>(&self, produce: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }
        let value = produce()?;
        // A producer that re-entered this slot already filled it; keep that value.
        Ok(self.cell.get_or_init(|| value))
    }

    /// Infallible form of [`LazyCache::get_or_try_init`].
    pub fn get_or_init(&self, produce: impl FnOnce() -> T) -> &T {
        self.cell.get_or_init(produce)
    }
}

impl<T> Default for LazyCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for LazyCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(value) => f.debug_tuple("LazyCache").field(value).finish(),
            None => f.write_str("LazyCache(<unresolved>)"),
        }
    }
}
