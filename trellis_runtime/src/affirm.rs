//! Assertion checks that speak the exception protocol.
//!
//! Three forms, graded by what they do in production builds:
//!
//! - [`affirm!`](crate::affirm) — debug-only invariant check, the `assert`
//!   of this engine. Compiled out entirely without `debug_assertions`.
//! - [`validate!`](crate::validate) — always checked; a production failure
//!   returns the given value from the enclosing function.
//! - [`check!`](crate::check) — always checked; a production failure throws
//!   the given class.
//!
//! All three funnel failures through [`assert_action`]: inside handling
//! scope it throws [`FAILED_ASSERTION`] with the stringified expression as
//! data, outside it prints the standard message and — under the
//! `abort-on-assert` feature — aborts. Having a function instead of pure
//! macro expansion also gives a debugger somewhere to put a breakpoint.

use crate::protocol;
use std::sync::Arc;
use trellis_core::diag;
use trellis_core::FAILED_ASSERTION;

/// Whether the assertion terminator aborts (the `abort-on-assert` feature).
pub const DO_ABORT: bool = cfg!(feature = "abort-on-assert");

/// Processes a failed assertion.
///
/// Inside a `try`/`catch`/`finally` scope this throws [`FAILED_ASSERTION`]
/// carrying `expr` (the stringified condition) as data and does not return
/// normally. Outside handling scope it prints
/// `Assertion failed ...` on the diagnostic channel and, when `do_abort`
/// is set, aborts the process.
pub fn assert_action(do_abort: bool, expr: &'static str, file: &'static str, line: u32) {
    if crate::scope().is_handling() {
        protocol::throw_impl(&FAILED_ASSERTION, Some(Arc::new(expr)), file, line);
        return;
    }

    diag!(
        "Assertion failed {}: {expr}, file \"{file}\", line {line}.",
        if do_abort { "" } else { "(no abort)" }
    );
    if do_abort {
        std::process::abort();
    }
}

/// Debug-only invariant check.
///
/// With `debug_assertions`, a false condition runs [`assert_action`];
/// without, the macro expands to nothing and the condition is not even
/// evaluated.
#[macro_export]
macro_rules! affirm {
    ($cond:expr) => {
        #[cfg(debug_assertions)]
        {
            if !($cond) {
                $crate::affirm::assert_action(
                    $crate::affirm::DO_ABORT,
                    ::core::stringify!($cond),
                    ::core::file!(),
                    ::core::line!(),
                );
            }
        }
    };
}

/// Always-on check that returns from the enclosing function on failure.
///
/// The condition is evaluated in every build. On failure a debug build
/// first runs the assertion action (which throws inside handling scope);
/// if that comes back, `retval` is returned from the enclosing function.
/// Use `validate!(cond)` in functions returning `()`.
#[macro_export]
macro_rules! validate {
    ($cond:expr) => {
        $crate::validate!($cond, ())
    };
    ($cond:expr, $retval:expr) => {
        if !($cond) {
            #[cfg(debug_assertions)]
            $crate::affirm::assert_action(
                $crate::affirm::DO_ABORT,
                ::core::stringify!($cond),
                ::core::file!(),
                ::core::line!(),
            );
            return $retval;
        }
    };
}

/// Always-on check that throws `class` on failure.
///
/// The condition is evaluated in every build. On failure a debug build
/// first runs the assertion action (which throws [`FAILED_ASSERTION`]
/// inside handling scope); otherwise `class` is thrown.
#[macro_export]
macro_rules! check {
    ($cond:expr, $class:path) => {
        if !($cond) {
            #[cfg(debug_assertions)]
            $crate::affirm::assert_action(
                $crate::affirm::DO_ABORT,
                ::core::stringify!($cond),
                ::core::file!(),
                ::core::line!(),
            );
            $crate::throw!($class);
        }
    };
}

// ============================================================================
// Tests
// ============================================================================
