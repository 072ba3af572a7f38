//! Exception classes.
//!
//! This module defines the static, user-extensible class DAG the engine
//! dispatches on. Every class is a statically-constructed record with a
//! single parent link; the forest is rooted at [`THROWABLE`]
//! (`parent == None`). Identity is pointer identity, so two classes are the
//! same class iff they are the same `static`.
//!
//! # Hierarchy
//!
//! ```text
//! Throwable
//! └── Exception
//!     ├── OutOfMemoryError
//!     ├── FailedAssertion
//!     └── RuntimeException
//!         ├── AbnormalTermination      (SIGABRT)
//!         ├── ArithmeticException      (SIGFPE)
//!         ├── IllegalInstruction       (SIGILL)
//!         ├── SegmentationFault        (SIGSEGV)
//!         └── BusError                 (SIGBUS)
//! ```
//!
//! User crates extend the forest anywhere with [`define_class!`], including
//! under classes defined in other crates. There is no multiple inheritance
//! and no diamond resolution: the ancestry test is a linear parent walk.

use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};

/// Sentinel for "no signal number recorded on this class".
const NO_SIGNAL: i32 = 0;

/// An exception class: a node in the static class DAG.
///
/// Classes are declared as `static` items and compared by address. The
/// optional signal-number slot is written by the signal adapter when it
/// installs handlers, so the outermost teardown can re-raise the original
/// trap.
pub struct Class {
    parent: Option<&'static Class>,
    name: &'static str,
    signal: AtomicI32,
}

impl Class {
    /// Creates a class record with the given parent.
    ///
    /// Prefer [`define_class!`] in user code; this constructor exists so the
    /// macro (and the engine's builtins) can build classes in `static`
    /// position.
    #[inline]
    pub const fn new(name: &'static str, parent: Option<&'static Class>) -> Self {
        Self {
            parent,
            name,
            signal: AtomicI32::new(NO_SIGNAL),
        }
    }

    /// Returns the class name.
    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the parent class, or `None` for a root.
    #[inline]
    pub const fn parent(&self) -> Option<&'static Class> {
        self.parent
    }

    /// Returns true if `self` and `other` are the same class record.
    #[inline]
    pub fn is(&'static self, other: &'static Class) -> bool {
        std::ptr::eq(self, other)
    }

    /// Ancestry test: true iff `self` is `base` or a descendant of it.
    ///
    /// Walks `self → parent → …` and succeeds if it meets `base` before the
    /// root. Identity is the match.
    pub fn is_derived(&'static self, base: &'static Class) -> bool {
        let mut class = self;
        while let Some(parent) = class.parent {
            if class.is(base) {
                return true;
            }
            class = parent;
        }
        class.is(base)
    }

    /// Returns the signal number recorded on this class, if any.
    #[inline]
    pub fn signal(&self) -> Option<i32> {
        match self.signal.load(Ordering::Relaxed) {
            NO_SIGNAL => None,
            n => Some(n),
        }
    }

    /// Records the signal number that maps to this class.
    ///
    /// Written by the signal adapter at handler installation; redundant
    /// after the first time.
    #[inline]
    pub fn set_signal(&self, number: i32) {
        self.signal.store(number, Ordering::Relaxed);
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("parent", &self.parent.map(Class::name))
            .finish()
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Defines an exception class with a single parent.
///
/// This is the definition form: exactly one per class per program. Other
/// modules reference the class through an ordinary `use`.
///
/// ```
/// use trellis_core::{define_class, EXCEPTION};
///
/// define_class!(pub ParseError: EXCEPTION);
/// define_class!(pub UnterminatedString: ParseError);
///
/// assert!(UnterminatedString.is_derived(&EXCEPTION));
/// ```
#[macro_export]
macro_rules! define_class {
    ($vis:vis $name:ident : $parent:path) => {
        #[allow(non_upper_case_globals)]
        $vis static $name: $crate::class::Class = $crate::class::Class::new(
            ::core::stringify!($name),
            ::core::option::Option::Some(&$parent),
        );
    };
}

// ============================================================================
// Builtin forest
// ============================================================================

/// Root of the class forest.
pub static THROWABLE: Class = Class::new("Throwable", None);

/// Base class of all ordinary exceptions.
pub static EXCEPTION: Class = Class::new("Exception", Some(&THROWABLE));

/// Allocation failure, thrown by the allocation wrappers.
pub static OUT_OF_MEMORY_ERROR: Class = Class::new("OutOfMemoryError", Some(&EXCEPTION));

/// A failed `affirm!`/`validate!`/`check!` condition.
pub static FAILED_ASSERTION: Class = Class::new("FailedAssertion", Some(&EXCEPTION));

/// Base class of the synchronous-trap branch.
pub static RUNTIME_EXCEPTION: Class = Class::new("RuntimeException", Some(&EXCEPTION));

/// SIGABRT as an exception.
pub static ABNORMAL_TERMINATION: Class =
    Class::new("AbnormalTermination", Some(&RUNTIME_EXCEPTION));

/// SIGFPE as an exception.
pub static ARITHMETIC_EXCEPTION: Class =
    Class::new("ArithmeticException", Some(&RUNTIME_EXCEPTION));

/// SIGILL as an exception.
pub static ILLEGAL_INSTRUCTION: Class = Class::new("IllegalInstruction", Some(&RUNTIME_EXCEPTION));

/// SIGSEGV as an exception.
pub static SEGMENTATION_FAULT: Class = Class::new("SegmentationFault", Some(&RUNTIME_EXCEPTION));

/// SIGBUS as an exception.
pub static BUS_ERROR: Class = Class::new("BusError", Some(&RUNTIME_EXCEPTION));

// ============================================================================
// Tests
// ============================================================================
