//! Synchronous-signal adapter.
//!
//! Installs one common handler for the synchronous traps (`SIGABRT`,
//! `SIGFPE`, `SIGILL`, `SIGSEGV`, `SIGBUS`) when a context's handler stack
//! becomes non-empty, and restores the previously-installed dispositions
//! when it empties again. A delivered trap enters the engine as a thrown
//! exception with origin `"?":0` — no source information exists for a
//! hardware fault.
//!
//! # Handler policies
//!
//! - **Private** (default): every context saves its own set of previous
//!   dispositions at its first `try` and restores them at its outermost
//!   teardown.
//! - **Shared** (`shared-handlers` feature): one process-wide set, saved by
//!   the first thread to enter any `try` and restored by the last thread to
//!   leave, tracked by an active-try thread count.
//!
//! Only synchronous, thread-directed traps are adapted. Asynchronous
//! signals keep whatever dispositions the application gave them.
//!
//! The handler is `extern "C-unwind"`: the throw unwinds out of the signal
//! frame, which requires unwind tables through the signal trampoline (true
//! of the usual unix targets).

use crate::context::Context;
use libc::c_int;
use trellis_core::class::Class;
use trellis_core::{
    ABNORMAL_TERMINATION, ARITHMETIC_EXCEPTION, BUS_ERROR, ILLEGAL_INSTRUCTION, SEGMENTATION_FAULT,
};

#[cfg(feature = "shared-handlers")]
use parking_lot::Mutex;

/// The traps the adapter translates, with their exception classes.
const TRAPPED: [(c_int, &Class); 5] = [
    (libc::SIGABRT, &ABNORMAL_TERMINATION),
    (libc::SIGFPE, &ARITHMETIC_EXCEPTION),
    (libc::SIGILL, &ILLEGAL_INSTRUCTION),
    (libc::SIGSEGV, &SEGMENTATION_FAULT),
    (libc::SIGBUS, &BUS_ERROR),
];

/// Maps a signal number to its exception class.
///
/// Exhaustive over the installed set; anything else is a signal the adapter
/// will not translate.
pub fn signal_class(number: c_int) -> Option<&'static Class> {
    TRAPPED
        .iter()
        .find(|(sig, _)| *sig == number)
        .map(|(_, class)| *class)
}

// ============================================================================
// Saved dispositions
// ============================================================================

/// Previously-installed dispositions for the five traps, in [`TRAPPED`]
/// order.
#[derive(Clone, Copy)]
pub(crate) struct SavedHandlers {
    previous: [libc::sighandler_t; TRAPPED.len()],
}

#[cfg(feature = "shared-handlers")]
#[derive(Default)]
struct TrapShared {
    /// Number of threads currently inside any `try`.
    active_try_threads: usize,

    /// Process-wide saved dispositions.
    saved: Option<SavedHandlers>,
}

#[cfg(feature = "shared-handlers")]
static TRAP_SHARED: Mutex<TrapShared> = Mutex::new(TrapShared {
    active_try_threads: 0,
    saved: None,
});

// ============================================================================
// Install / restore
// ============================================================================

fn handler_addr() -> libc::sighandler_t {
    trap_handler as extern "C-unwind" fn(c_int) as libc::sighandler_t
}

/// Saves the current dispositions and installs the trap handler.
fn install() -> SavedHandlers {
    let mut previous = [0 as libc::sighandler_t; TRAPPED.len()];
    for (slot, (number, class)) in previous.iter_mut().zip(TRAPPED) {
        class.set_signal(number);
        *slot = unsafe { libc::signal(number, handler_addr()) };
    }
    SavedHandlers { previous }
}

/// Puts the saved dispositions back.
fn restore(saved: SavedHandlers) {
    for ((number, _), previous) in TRAPPED.iter().zip(saved.previous) {
        unsafe {
            libc::signal(*number, previous);
        }
    }
}

/// Accounts `ctx` as inside a `try` and installs handlers if the policy
/// calls for it. Invoked on the push that makes the stack non-empty.
pub(crate) fn install_for(ctx: &mut Context) {
    if ctx.installed {
        return;
    }
    ctx.installed = true;

    #[cfg(feature = "shared-handlers")]
    {
        let mut shared = TRAP_SHARED.lock();
        shared.active_try_threads += 1;
        if shared.active_try_threads == 1 {
            shared.saved = Some(install());
        }
    }

    #[cfg(not(feature = "shared-handlers"))]
    {
        ctx.saved = Some(install());
    }
}

/// Undoes [`install_for`]. Returns true if the application's dispositions
/// were actually put back (under the shared policy, only the last thread
/// out does that).
pub(crate) fn restore_for(ctx: &mut Context) -> bool {
    if !ctx.installed {
        return false;
    }
    ctx.installed = false;

    #[cfg(feature = "shared-handlers")]
    {
        let mut shared = TRAP_SHARED.lock();
        shared.active_try_threads -= 1;
        if shared.active_try_threads == 0 {
            if let Some(saved) = shared.saved.take() {
                restore(saved);
            }
            return true;
        }
        false
    }

    #[cfg(not(feature = "shared-handlers"))]
    {
        match ctx.saved.take() {
            Some(saved) => {
                restore(saved);
                true
            }
            None => false,
        }
    }
}

/// Re-raises a trap's signal number so the restored disposition sees it.
pub(crate) fn reraise(number: i32) {
    unsafe {
        libc::raise(number);
    }
}

// ============================================================================
// The handler
// ============================================================================

/// Common handler for the adapted traps.
///
/// Re-installs itself first (some systems reset the disposition to default
/// on delivery), then throws the mapped class. A signal with no mapping is
/// refused: its disposition is reset to default and the handler returns.
extern "C-unwind" fn trap_handler(number: c_int) {
    let Some(class) = signal_class(number) else {
        unsafe {
            libc::signal(number, libc::SIG_DFL);
        }
        return;
    };

    unsafe {
        libc::signal(number, handler_addr());
    }

    class.set_signal(number); // redundant after install, kept for rigor
    crate::protocol::throw_from_trap(class);
}

// ============================================================================
// Tests
// ============================================================================
