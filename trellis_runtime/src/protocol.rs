//! The `try`/`catch`/`finally` control-flow protocol.
//!
//! This module is the state machine behind the construct macros. One
//! [`run_construct`] call drives one `try … catch* … finally` construct:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                       Construct protocol                             │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                                                                      │
//! │   T0  push frame ──▶ V  validate catch list (debug, once per site)   │
//! │                          │                                           │
//! │                          ▼                                           │
//! │   T   scope=Try, run the try block                                   │
//! │        │ normal          │ throw                │ deferred return    │
//! │        ▼                 ▼                      ▼                    │
//! │       (skip)    C  first matching catch       (skip catches)         │
//! │        │            scope=Catch, run clause     │                    │
//! │        └───────────┬────┘                       │                    │
//! │                    ▼                            │                    │
//! │   F1  scope=Finally, run the finally block ◀────┘                    │
//! │                    │                                                 │
//! │                    ▼                                                 │
//! │   F2  teardown: pop; outermost → terminal action, destroy context;   │
//! │        inner → consume a deferred return at the construct boundary   │
//! │        or rethrow the pending exception into the enclosing frame     │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A `throw` travels as an unwind with a private zero-sized payload; the
//! thrown identity itself lives in the innermost frame. The driver arrests
//! the unwind at each phase boundary, which is what makes a throw inside a
//! `catch` or `finally` land in the right place: the phase that caught it
//! *is* the jump destination.
//!
//! The user blocks of one construct are a single `FnMut` dispatched on
//! [`Phase`], so they share one capture environment — a construct's `try`,
//! `catch` and `finally` may all touch the same locals.

use crate::checker::{self, CheckSite};
use crate::context;
use crate::exception::Exception;
use crate::frame::{ExcData, Frame, FrameState, Scope};
use crate::signals;
use smallvec::SmallVec;
use std::any::Any;
use std::panic::{self, catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use trellis_core::class::Class;
use trellis_core::diag;
use trellis_core::{FAILED_ASSERTION, RUNTIME_EXCEPTION};

/// The internal class that piggy-backs a deferred `return` on the exception
/// protocol. Never visible to user code: no catch clause can name it.
static RETURN_EVENT: Class = Class::new("ReturnEvent", None);

/// Unwind payload of an engine throw. Zero-sized: the thrown identity is in
/// the innermost frame, the payload only carries control.
pub(crate) struct ThrowSignal;

// ============================================================================
// Flow / Completion
// ============================================================================

/// What a user block hands back to the driver.
#[derive(Debug)]
pub enum Flow<R> {
    /// The block ran to its end.
    Done,

    /// The block requested a deferred return with the given value
    /// (the expansion of `ret!`).
    Return(R),
}

/// How a whole construct completed.
#[must_use = "a deferred return must be propagated or performed"]
#[derive(Debug)]
pub enum Completion<R> {
    /// Normal completion; execution continues after the construct.
    Normal,

    /// A deferred return reached this construct's boundary. The caller
    /// performs the actual `return` (or re-propagates, when lexically
    /// nested inside another construct of the same function).
    Return(R),
}

// ============================================================================
// Phases and clauses
// ============================================================================

/// Which user block the driver wants to run.
pub enum Phase<'x> {
    /// The `try` block.
    Try,

    /// The catch clause with the given index, receiving the caught
    /// exception.
    Catch(usize, &'x Exception),

    /// The `finally` block.
    Finally,
}

/// Static description of one catch clause: its class and source line.
#[derive(Clone, Copy)]
pub struct ClauseSpec {
    /// The class the clause catches.
    pub class: &'static Class,

    /// Source line of the clause, for validator diagnostics.
    pub line: u32,
}

/// Inline capacity for validator clause metadata.
const INLINE_CLAUSES: usize = 4;

// ============================================================================
// Protocol trace
// ============================================================================

#[cfg(feature = "protocol-trace")]
fn trace(name: &str) {
    let depth = context::try_with(|ctx| ctx.depth()).unwrap_or(0);
    diag!("{:indent$}{name}", "", indent = depth);
}

#[cfg(not(feature = "protocol-trace"))]
#[inline(always)]
fn trace(_name: &str) {}

// ============================================================================
// The driver
// ============================================================================

/// Runs one `try … catch* … finally` construct.
///
/// `block` holds the construct's user code and is dispatched once per phase
/// the protocol reaches; `clauses` describes the catch clauses in source
/// order. This is the low-level entry the [`attempt!`](crate::attempt) and
/// [`attempt_nested!`](crate::attempt_nested) macros expand to.
///
/// [`Completion::Return`] means a deferred return reached this construct —
/// either its own `ret!` or one propagated from a construct nested in one
/// of its blocks — after every intervening `finally` has run.
pub fn run_construct<R, F>(
    file: &'static str,
    line: u32,
    site: &'static CheckSite,
    clauses: &[ClauseSpec],
    mut block: F,
) -> Completion<R>
where
    F: FnMut(Phase<'_>) -> Flow<R>,
{
    ensure_panic_filter();

    // T0: frame setup; handlers go in when the stack becomes non-empty.
    context::with(|ctx| {
        if ctx.depth() == 0 {
            signals::install_for(ctx);
        }
        ctx.push(Frame::new(file, line));
    });
    trace("try");

    // V: catch-list validation, debug builds, once per source site.
    if cfg!(debug_assertions) {
        let meta: SmallVec<[(&'static Class, u32); INLINE_CLAUSES]> =
            clauses.iter().map(|c| (c.class, c.line)).collect();
        checker::validate(site, file, line, &meta);
    }

    let mut deferred: Option<R> = None;
    let mut foreign: Option<Box<dyn Any + Send>> = None;

    // T: the try block.
    set_scope(Scope::Try);
    match catch_unwind(AssertUnwindSafe(|| block(Phase::Try))) {
        Ok(Flow::Done) => {}
        Ok(Flow::Return(value)) => {
            mark_deferred_return();
            deferred = Some(value);
        }
        Err(payload) => {
            if !is_throw(&payload) {
                foreign = Some(payload);
            }
        }
    }

    // C: first matching clause, in source order.
    if foreign.is_none() && catchable_pending() {
        let exc = snapshot();
        for (index, clause) in clauses.iter().enumerate() {
            if exc.class().is_derived(clause.class) {
                trace("catch");
                mark_caught();
                match catch_unwind(AssertUnwindSafe(|| block(Phase::Catch(index, &exc)))) {
                    Ok(Flow::Done) => {}
                    Ok(Flow::Return(value)) => {
                        mark_deferred_return();
                        deferred = Some(value);
                    }
                    Err(payload) => {
                        if !is_throw(&payload) {
                            foreign = Some(payload);
                        }
                    }
                }
                break;
            }
        }
    }

    // F1: the finally block, always.
    set_scope(Scope::Finally);
    trace("finally");
    match catch_unwind(AssertUnwindSafe(|| block(Phase::Finally))) {
        Ok(Flow::Done) => {}
        Ok(Flow::Return(value)) => {
            // A return inside `finally` overrules whatever was pending.
            mark_deferred_return();
            deferred = Some(value);
        }
        Err(payload) => {
            if is_throw(&payload) {
                // A throw inside `finally` overrules a deferred return.
                deferred = None;
                foreign = None;
            } else {
                foreign = Some(payload);
            }
        }
    }

    // F2: teardown.
    let action = teardown();
    if let Some(payload) = foreign {
        panic::resume_unwind(payload);
    }
    match action {
        Teardown::Completed => match deferred {
            Some(value) => Completion::Return(value),
            None => Completion::Normal,
        },
        Teardown::Rethrow {
            class,
            data,
            file,
            line,
        } => {
            throw_impl(class, data, file, line);
            unreachable!("a rethrow always unwinds into the enclosing frame")
        }
    }
}

// ============================================================================
// Teardown
// ============================================================================

enum Teardown {
    /// The construct is done; a deferred return (if any) completes at its
    /// boundary.
    Completed,

    /// Propagate the pending exception into the enclosing frame.
    Rethrow {
        class: &'static Class,
        data: Option<ExcData>,
        file: &'static str,
        line: u32,
    },
}

/// Pops the frame and resolves it per the terminal rules.
fn teardown() -> Teardown {
    trace("finalize");
    let (frame, now_empty) = context::with(|ctx| {
        let frame = ctx.pop().expect("teardown without a frame");
        (frame, ctx.depth() == 0)
    });

    if !now_empty {
        // Inner level: propagate.
        if frame.state != FrameState::Pending {
            return Teardown::Completed;
        }
        let class = frame.class.expect("pending frame carries a class");
        if class.is(&RETURN_EVENT) {
            // Consumed here; the construct boundary performs or propagates
            // the deferred return.
            return Teardown::Completed;
        }
        return Teardown::Rethrow {
            class,
            data: frame.data,
            file: frame.file,
            line: frame.line,
        };
    }

    // Outermost level: terminal action.
    let restored = context::with(signals::restore_for);
    let mut raise_number = None;
    if frame.state == FrameState::Pending {
        let class = frame.class.expect("pending frame carries a class");
        if class.is(&FAILED_ASSERTION) {
            crate::affirm::assert_action(
                crate::affirm::DO_ABORT,
                assertion_expr(&frame),
                frame.file,
                frame.line,
            );
        } else if class.is(&RETURN_EVENT) {
            // Deferred return at the outermost frame: completes below.
        } else if class.is_derived(&RUNTIME_EXCEPTION) && restored {
            raise_number = class.signal();
            if raise_number.is_none() {
                lost(class, frame.file, frame.line);
            }
        } else {
            lost(class, frame.file, frame.line);
        }
    }
    context::destroy_current();
    if let Some(number) = raise_number {
        // The application's disposition is back in place; hand it the
        // original trap.
        signals::reraise(number);
    }
    Teardown::Completed
}

fn lost(class: &'static Class, file: &'static str, line: u32) {
    diag!("{} lost: file \"{file}\", line {line}.", class.name());
}

/// Extracts the stringified expression a failed assertion carries.
fn assertion_expr(frame: &Frame) -> &'static str {
    frame
        .data
        .as_deref()
        .and_then(|data| data.downcast_ref::<&'static str>())
        .copied()
        .unwrap_or("?")
}

// ============================================================================
// Throw
// ============================================================================

/// Values a bare `throw!` accepts: a class (fresh throw) or a caught
/// exception (precise rethrow, original origin preserved).
///
/// The two implementations are the engine's class/instance discrimination:
/// a class installs a new identity stamped with the call site, an exception
/// re-installs its own.
pub trait Raisable {
    /// Raises `self` at the given call site.
    fn raise(self, file: &'static str, line: u32);
}

impl Raisable for &'static Class {
    #[inline]
    fn raise(self, file: &'static str, line: u32) {
        throw_impl(self, None, file, line);
    }
}

impl Raisable for &Exception {
    #[inline]
    fn raise(self, _file: &'static str, _line: u32) {
        let (file, line) = self.origin();
        throw_impl(self.class(), self.share_data(), file, line);
    }
}

/// Throws `class` with attached user data.
pub fn throw_with<D: Any + Send + Sync>(
    class: &'static Class,
    data: D,
    file: &'static str,
    line: u32,
) {
    throw_impl(class, Some(Arc::new(data) as ExcData), file, line);
}

/// Signal-adapter entry: a trap has no source information.
pub(crate) fn throw_from_trap(class: &'static Class) {
    throw_impl(class, None, "?", 0);
}

/// Records the thrown identity in the innermost frame and unwinds to its
/// driver. With no active frame anywhere, the exception is lost: a notice
/// goes to the diagnostic channel and control returns to the caller.
pub(crate) fn throw_impl(
    class: &'static Class,
    data: Option<ExcData>,
    file: &'static str,
    line: u32,
) {
    trace("throw");
    let recorded = context::try_with(|ctx| {
        if ctx.depth() == 0 {
            return false;
        }
        ctx.count_throw();
        let top = ctx.top_mut().expect("non-empty stack has a top");
        top.record(class, data, file, line);
        true
    })
    .unwrap_or(false);

    if recorded {
        ensure_panic_filter();
        panic::panic_any(ThrowSignal);
    }
    lost(class, file, line);
}

// ============================================================================
// Frame-state helpers
// ============================================================================

fn set_scope(scope: Scope) {
    context::try_with(|ctx| {
        if let Some(top) = ctx.top_mut() {
            top.scope = scope;
        }
    });
}

/// True if the top frame holds a pending exception a catch may take
/// (a pending deferred return is not catchable).
fn catchable_pending() -> bool {
    context::try_with(|ctx| {
        ctx.top().is_some_and(|top| {
            top.state == FrameState::Pending
                && top.class.is_some_and(|class| !class.is(&RETURN_EVENT))
        })
    })
    .unwrap_or(false)
}

fn snapshot() -> Exception {
    context::try_with(|ctx| Exception::from_frame(ctx.top().expect("pending frame")))
        .expect("snapshot requires a context")
}

fn mark_caught() {
    context::try_with(|ctx| {
        if let Some(top) = ctx.top_mut() {
            top.state = FrameState::Caught;
            top.scope = Scope::Catch;
        }
    });
}

/// `ret!` semantics: overrule whatever is pending with a `ReturnEvent`.
/// The value itself rides in the typed driver, not in the frame.
fn mark_deferred_return() {
    context::try_with(|ctx| {
        if let Some(top) = ctx.top_mut() {
            top.class = Some(&RETURN_EVENT);
            top.data = None;
            top.state = FrameState::Pending;
        }
    });
}

fn is_throw(payload: &(dyn Any + Send)) -> bool {
    payload.is::<ThrowSignal>()
}

// ============================================================================
// Public state accessors
// ============================================================================

/// Returns where control currently is: `Outside` when no frame is active,
/// otherwise the innermost frame's scope.
pub fn scope() -> Scope {
    context::try_with(|ctx| ctx.top().map_or(Scope::Outside, Frame::scope))
        .unwrap_or(Scope::Outside)
}

/// True if the innermost frame holds a pending (raised, not yet caught)
/// exception.
pub fn pending() -> bool {
    context::try_with(|ctx| {
        ctx.top()
            .is_some_and(|top| top.state == FrameState::Pending)
    })
    .unwrap_or(false)
}

// ============================================================================
// Panic-hook filter
// ============================================================================

/// Installs, once, a hook that keeps engine throws out of the default
/// panic report. Everything else goes to the previously-installed hook.
fn ensure_panic_filter() {
    static FILTER: OnceLock<()> = OnceLock::new();
    FILTER.get_or_init(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if info.payload().is::<ThrowSignal>() {
                return;
            }
            previous(info);
        }));
    });
}

// ============================================================================
// Tests
// ============================================================================
