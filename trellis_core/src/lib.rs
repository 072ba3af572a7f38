//! # Trellis Core
//!
//! Foundational types for the trellis exception runtime.
//!
//! This crate provides the building blocks shared by the engine and by user
//! crates that extend it:
//!
//! - **Class registry**: the static, user-extensible exception-class DAG
//!   with single-parent inheritance and the ancestry test
//! - **Diagnostics**: the process-wide textual channel every notice, warning
//!   and trace is written to
//! - **Error Handling**: error definitions for the fallible public surface
//!
//! The engine itself (handler stacks, the `try`/`catch`/`finally` state
//! machine, the signal adapter) lives in `trellis_runtime`.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod class;
pub mod diag;
pub mod error;

pub use class::{
    Class, ABNORMAL_TERMINATION, ARITHMETIC_EXCEPTION, BUS_ERROR, EXCEPTION, FAILED_ASSERTION,
    ILLEGAL_INSTRUCTION, OUT_OF_MEMORY_ERROR, RUNTIME_EXCEPTION, SEGMENTATION_FAULT, THROWABLE,
};
pub use error::ContextError;

/// Trellis runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
