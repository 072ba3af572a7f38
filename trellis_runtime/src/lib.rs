//! Centralized exception handling for code that wants `try`/`catch`/
//! `finally` semantics: a user-extensible class hierarchy, propagation and
//! rethrow, `finally` cleanup across early exits, synchronous traps
//! delivered as exceptions, and multi-threaded operation.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                          trellis_runtime                           │
//! ├────────────────────────────────────────────────────────────────────┤
//! │                                                                    │
//! │  ┌──────────────┐   attempt!/throw!/ret!   ┌────────────────────┐  │
//! │  │   macros     │ ───────────────────────▶ │ protocol (driver)  │  │
//! │  └──────────────┘                          │  T0 V T C F1 F2    │  │
//! │                                            └─────────┬──────────┘  │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────▼──────────┐  │
//! │  │   checker    │  │   signals    │  │ context (per thread)     │  │
//! │  │ (debug pass) │  │ (trap adapt) │  │  frame stack + registry  │  │
//! │  └──────────────┘  └──────────────┘  └──────────────────────────┘  │
//! │                                                                    │
//! │  affirm (assertions)      alloc (OOM-throwing wrappers)            │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Classes and the diagnostic channel live in `trellis_core` and are
//! re-exported here.
//!
//! # Example
//!
//! ```
//! use trellis_runtime::{attempt, define_class, throw, EXCEPTION};
//!
//! define_class!(TooSmall: EXCEPTION);
//!
//! let mut seen = String::new();
//! attempt! {
//!     try {
//!         throw!(TooSmall);
//!     }
//!     catch (EXCEPTION, e) {
//!         seen = e.message();
//!     }
//!     finally {}
//! }
//! assert!(seen.starts_with("TooSmall: file "));
//! ```
//!
//! # Build-time configuration
//!
//! - `debug_assertions` selects debug mode: the catch-list validator and
//!   the throwing `affirm!`.
//! - `threads` (default): per-thread contexts with a process-global store.
//! - `shared-handlers`: one process-wide set of saved signal dispositions
//!   instead of one per context.
//! - `abort-on-assert`: the assertion terminator aborts after printing.
//! - `protocol-trace`: indented engine log on the diagnostic channel.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod affirm;
pub mod alloc;
pub mod checker;
pub mod context;
pub mod exception;
pub mod frame;
pub mod protocol;
pub mod signals;

mod macros;

// Re-exports
pub use checker::CheckSite;
pub use context::{cease_thread, context_stats, thread_ident, Context, ContextStats};
pub use exception::Exception;
pub use frame::{ExcData, Frame, FrameState, Scope};
pub use protocol::{
    pending, run_construct, scope, throw_with, ClauseSpec, Completion, Flow, Phase, Raisable,
};

pub use trellis_core::class::Class;
pub use trellis_core::{
    define_class, diag, ContextError, ABNORMAL_TERMINATION, ARITHMETIC_EXCEPTION, BUS_ERROR,
    EXCEPTION, FAILED_ASSERTION, ILLEGAL_INSTRUCTION, OUT_OF_MEMORY_ERROR, RUNTIME_EXCEPTION,
    SEGMENTATION_FAULT, THROWABLE,
};

/// Trellis runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
