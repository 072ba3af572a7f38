//! Caught exception values.
//!
//! An [`Exception`] is what a `catch` clause receives: the class of the
//! occurred exception, the user data attached at the `throw` site, and the
//! origin of the raise. It also carries the trace printer, which walks the
//! calling thread's handler stack at call time.

use crate::context;
use crate::frame::{ExcData, Frame};
use std::any::Any;
use std::fmt;
use std::io::{self, Write};
use trellis_core::class::Class;
use trellis_core::diag;

/// A caught (or rethrowable) exception.
#[derive(Clone)]
pub struct Exception {
    class: &'static Class,
    data: Option<ExcData>,
    file: &'static str,
    line: u32,
}

impl Exception {
    #[inline]
    pub(crate) fn new(
        class: &'static Class,
        data: Option<ExcData>,
        file: &'static str,
        line: u32,
    ) -> Self {
        Self {
            class,
            data,
            file,
            line,
        }
    }

    /// Builds the caught view of a pending frame.
    pub(crate) fn from_frame(frame: &Frame) -> Self {
        Self::new(
            frame.class.expect("pending frame carries a class"),
            frame.data.clone(),
            frame.file,
            frame.line,
        )
    }

    /// Returns the exception class.
    #[inline]
    pub fn class(&self) -> &'static Class {
        self.class
    }

    /// Returns the origin of the raise as `(file, line)`.
    ///
    /// A trap delivered by the signal adapter reports `("?", 0)`.
    #[inline]
    pub fn origin(&self) -> (&'static str, u32) {
        (self.file, self.line)
    }

    /// Returns the descriptive message: `Name: file "origin", line N.`
    pub fn message(&self) -> String {
        format!(
            "{}: file \"{}\", line {}.",
            self.class.name(),
            self.file,
            self.line
        )
    }

    /// Returns the user data attached at the `throw` site, if any.
    #[inline]
    pub fn data(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.data.as_deref()
    }

    /// Returns the attached data downcast to `T`.
    #[inline]
    pub fn data_as<T: Any>(&self) -> Option<&T> {
        self.data.as_deref().and_then(|d| d.downcast_ref::<T>())
    }

    /// Shares the attached data for a rethrow.
    #[inline]
    pub(crate) fn share_data(&self) -> Option<ExcData> {
        self.data.clone()
    }

    /// Prints the nested `try` trace to `out`.
    ///
    /// Walks the calling thread's handler stack from the innermost `try`
    /// outward, one line per frame, preceded by a header naming the class
    /// (and, in a multi-threaded build, the thread).
    pub fn print_try_trace<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        #[cfg(feature = "threads")]
        writeln!(
            out,
            "{} occurred in thread {}:",
            self.class.name(),
            context::thread_ident()
        )?;
        #[cfg(not(feature = "threads"))]
        writeln!(out, "{} occurred:", self.class.name())?;

        let sites = context::try_with(|ctx| {
            ctx.frames()
                .rev()
                .map(Frame::try_site)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
        for (file, line) in sites {
            writeln!(out, "        in 'try' at {file}:{line}")?;
        }
        Ok(())
    }

    /// Prints the nested `try` trace to the diagnostic channel.
    pub fn print_try_trace_default(&self) {
        diag::with_sink(|out| self.print_try_trace(out));
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: file \"{}\", line {}.",
            self.class.name(),
            self.file,
            self.line
        )
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exception")
            .field("class", &self.class.name())
            .field("origin", &format_args!("{}:{}", self.file, self.line))
            .field("has_data", &self.data.is_some())
            .finish()
    }
}

impl std::error::Error for Exception {}

// ============================================================================
// Tests
// ============================================================================
