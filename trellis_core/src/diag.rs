//! The diagnostic channel.
//!
//! A single process-wide textual stream. Lost-exception notices, catch-list
//! warnings, assertion messages and the `try`-trace printer all write here.
//! The default sink is standard error; tests (or embedders) swap it with
//! [`set_sink`] to capture output.

use parking_lot::Mutex;
use std::fmt;
use std::io::{self, Write};

/// The installed sink. `None` means standard error.
static SINK: Mutex<Option<Box<dyn Write + Send>>> = Mutex::new(None);

/// Replaces the diagnostic sink, returning the previous one.
///
/// `None` restores the default (standard error).
pub fn set_sink(sink: Option<Box<dyn Write + Send>>) -> Option<Box<dyn Write + Send>> {
    std::mem::replace(&mut *SINK.lock(), sink)
}

/// Writes one diagnostic line (a newline is appended).
///
/// Write errors are swallowed: diagnostics are best-effort, exactly like
/// printing to a closed stderr.
pub fn emit(args: fmt::Arguments<'_>) {
    let mut guard = SINK.lock();
    let _ = match guard.as_mut() {
        Some(sink) => sink.write_fmt(args).and_then(|()| sink.write_all(b"\n")),
        None => {
            let mut err = io::stderr().lock();
            err.write_fmt(args).and_then(|()| err.write_all(b"\n"))
        }
    };
}

/// Runs `f` with exclusive access to the sink, for multi-line output such as
/// the `try` trace.
pub fn with_sink<F>(f: F)
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let mut guard = SINK.lock();
    let _ = match guard.as_mut() {
        Some(sink) => f(sink.as_mut()),
        None => f(&mut io::stderr().lock()),
    };
}

/// Writes one line to the diagnostic channel.
#[macro_export]
macro_rules! diag {
    ($($arg:tt)*) => {
        $crate::diag::emit(::core::format_args!($($arg)*))
    };
}

// ============================================================================
// Tests
// ============================================================================
