//! Instance Tokens
//!
//! Async continuations may resume after the popup they belong to was torn
//! down. Each continuation captures an [`ActiveToken`] when it starts and
//! checks it before mutating shared state; teardown advances the
//! [`Generation`], which invalidates every outstanding token at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic generation counter shared by one popup instance
#[derive(Clone, Debug, Default)]
pub struct Generation {
    current: Arc<AtomicU64>,
}

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token bound to the current generation
    pub fn token(&self) -> ActiveToken {
        ActiveToken {
            generation: self.current.load(Ordering::SeqCst),
            current: Arc::clone(&self.current),
        }
    }

    /// Invalidate all outstanding tokens
    pub fn advance(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn value(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}

/// Proof that a continuation belongs to a still-live instance
#[derive(Clone, Debug)]
pub struct ActiveToken {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl ActiveToken {
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_invalidates_tokens() {
        let generation = Generation::new();
        let first = generation.token();
        assert!(first.is_current());

        generation.advance();
        assert!(!first.is_current());
        assert!(generation.token().is_current());
    }
}
