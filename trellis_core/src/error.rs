//! Error types for the fallible public surface.
//!
//! The engine's own control flow travels through the exception state
//! machine, not through `Result`. These types cover the handful of surface
//! operations that can fail in ordinary, recoverable ways.

use thiserror::Error;

/// Errors from per-thread context management.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// `cease_thread` was asked to tear down the calling thread's own
    /// context. A live thread's context is destroyed only by its outermost
    /// teardown.
    #[error("cannot cease the calling thread's own context")]
    CeaseSelf,

    /// No context is registered for the given thread identity.
    #[error("no exception context registered for thread {0}")]
    UnknownThread(u64),

    /// The operation requires the multi-threaded build.
    #[error("thread contexts are unavailable in a single-threaded build")]
    SingleThreaded,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            ContextError::CeaseSelf.to_string(),
            "cannot cease the calling thread's own context"
        );
        assert_eq!(
            ContextError::UnknownThread(7).to_string(),
            "no exception context registered for thread 7"
        );
    }
}
