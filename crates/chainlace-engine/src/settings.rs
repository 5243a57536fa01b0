//! Engine-wide settings and cooperative cancellation.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Ordering-hardening mode of the chaining engine.
///
/// [`Deterministic`](ChainingMode::Deterministic) is the contract: identical
/// grids yield identical hint lists, regardless of worker interleaving. The
/// legacy mode keeps the historical first-found behavior and exists for
/// comparing outputs against old runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainingMode {
    /// First-found contradictions, unsorted removable scans.
    Legacy,
    /// Minimum-ancestor contradictions, canonical removable ordering,
    /// minimum-ancestor region-rule nodes.
    #[default]
    Deterministic,
}

/// Runtime settings consumed by the chaining engine.
#[derive(Debug, Clone)]
pub struct Settings {
    num_threads: usize,
    chaining_mode: ChainingMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new(1, ChainingMode::Deterministic)
    }
}

impl Settings {
    /// Creates settings with the given worker count and chaining mode.
    ///
    /// # Panics
    ///
    /// Panics if `num_threads` is zero.
    #[must_use]
    pub fn new(num_threads: usize, chaining_mode: ChainingMode) -> Self {
        assert!(num_threads > 0);
        Self {
            num_threads,
            chaining_mode,
        }
    }

    /// Returns the number of workers available for parallel fan-out.
    #[must_use]
    #[inline]
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Returns the configured chaining mode.
    #[must_use]
    #[inline]
    pub fn chaining_mode(&self) -> ChainingMode {
        self.chaining_mode
    }

    /// Returns `true` if the deterministic ordering path is selected.
    #[must_use]
    #[inline]
    pub fn is_deterministic(&self) -> bool {
        self.chaining_mode == ChainingMode::Deterministic
    }
}

/// Cooperative cancellation flag shared between a caller and the engine.
///
/// The engine polls the token between sub-rule invocations (its propagation
/// loops are pure CPU work with no other natural checkpoint) and unwinds with
/// [`EngineError::Cancelled`](crate::EngineError::Cancelled) once it observes
/// the flag.
///
/// Cloning the token shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns `true` if cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_deterministic() {
        let settings = Settings::default();
        assert_eq!(settings.num_threads(), 1);
        assert!(settings.is_deterministic());
    }

    #[test]
    #[should_panic(expected = "num_threads > 0")]
    fn test_zero_threads_rejected() {
        let _ = Settings::new(0, ChainingMode::Deterministic);
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
