//! Allocation wrappers that throw on exhaustion.
//!
//! Call-throughs to the global allocator that turn allocation failure into
//! an [`OUT_OF_MEMORY_ERROR`] throw carrying the call site. The macro forms
//! ([`boxed!`](crate::boxed), [`buffer!`](crate::buffer),
//! [`grow!`](crate::grow)) capture file and line the way the rest of the
//! engine does.
//!
//! Outside any `try` the throw is lost by definition; since a `Box` cannot
//! carry "null", the wrappers then fall back to
//! [`std::alloc::handle_alloc_error`].

use crate::protocol;
use std::alloc::Layout;
use trellis_core::OUT_OF_MEMORY_ERROR;

/// Allocates `value` on the heap, throwing [`OUT_OF_MEMORY_ERROR`] on
/// exhaustion.
pub fn boxed<T>(value: T, file: &'static str, line: u32) -> Box<T> {
    let layout = Layout::new::<T>();
    if layout.size() == 0 {
        return Box::new(value);
    }
    let ptr = unsafe { std::alloc::alloc(layout) }.cast::<T>();
    if ptr.is_null() {
        protocol::throw_impl(&OUT_OF_MEMORY_ERROR, None, file, line);
        std::alloc::handle_alloc_error(layout);
    }
    unsafe {
        ptr.write(value);
        Box::from_raw(ptr)
    }
}

/// Allocates a zero-filled byte buffer, throwing [`OUT_OF_MEMORY_ERROR`]
/// on exhaustion.
pub fn buffer(len: usize, file: &'static str, line: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    if buf.try_reserve_exact(len).is_err() {
        protocol::throw_impl(&OUT_OF_MEMORY_ERROR, None, file, line);
        handle_layout_error(len);
    }
    buf.resize(len, 0);
    buf
}

/// Grows `vec` by at least `additional` elements, throwing
/// [`OUT_OF_MEMORY_ERROR`] on exhaustion.
pub fn grow<T>(vec: &mut Vec<T>, additional: usize, file: &'static str, line: u32) {
    if vec.try_reserve(additional).is_err() {
        protocol::throw_impl(&OUT_OF_MEMORY_ERROR, None, file, line);
        handle_layout_error(additional.saturating_mul(std::mem::size_of::<T>()));
    }
}

fn handle_layout_error(bytes: usize) -> ! {
    let layout =
        Layout::from_size_align(bytes.max(1), 1).unwrap_or_else(|_| Layout::new::<u8>());
    std::alloc::handle_alloc_error(layout)
}

/// Heap-allocates a value; allocation failure throws
/// [`OUT_OF_MEMORY_ERROR`] with this call site.
#[macro_export]
macro_rules! boxed {
    ($value:expr) => {
        $crate::alloc::boxed($value, ::core::file!(), ::core::line!())
    };
}

/// Allocates a zero-filled `Vec<u8>` of the given length; failure throws
/// [`OUT_OF_MEMORY_ERROR`] with this call site.
#[macro_export]
macro_rules! buffer {
    ($len:expr) => {
        $crate::alloc::buffer($len, ::core::file!(), ::core::line!())
    };
}

/// Reserves room for `$additional` more elements in `$vec`; failure throws
/// [`OUT_OF_MEMORY_ERROR`] with this call site.
#[macro_export]
macro_rules! grow {
    ($vec:expr, $additional:expr) => {
        $crate::alloc::grow(&mut $vec, $additional, ::core::file!(), ::core::line!())
    };
}

// ============================================================================
// Tests
// ============================================================================
