//! Per-thread exception contexts and the context store.
//!
//! Every thread that enters a `try` gets an [`Context`]: its handler stack
//! plus the signal bookkeeping that belongs to it. Contexts are created
//! lazily on the first `try` and destroyed by the outermost teardown, so a
//! thread that is not inside any `try` owns no engine state at all.
//!
//! # Storage
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Context store                            │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  thread A ── TLS cache ──┐      ┌──────────────────────────────┐ │
//! │  thread B ── TLS cache ──┼────▶ │ registry: FxHashMap<u64,     │ │
//! │  thread C ── TLS cache ──┘      │           Arc<ContextCell>>  │ │
//! │                                 │ (host mutex)                 │ │
//! │   own-context access:           └──────────────────────────────┘ │
//! │   lock-free via the cache        cease_thread / registration     │
//! │                                  go through the registry         │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Same-thread access never takes the lock: the thread-local cache holds an
//! `Arc` to the thread's own cell. The registry exists so context creation
//! is serialized and so a surviving thread can tear down a dead thread's
//! context with [`cease_thread`].
//!
//! In a single-threaded build (`threads` feature disabled) there is no
//! registry; the one context lives in the thread-local slot alone.

use crate::frame::Frame;
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicU64, Ordering};
use trellis_core::ContextError;

#[cfg(feature = "threads")]
use parking_lot::Mutex;
#[cfg(feature = "threads")]
use rustc_hash::FxHashMap;
#[cfg(feature = "threads")]
use std::sync::{Arc, OnceLock};

/// Inline capacity of the per-context frame stack.
/// Exception nesting is almost always shallow.
pub(crate) const INLINE_FRAME_CAPACITY: usize = 8;

// ============================================================================
// Context
// ============================================================================

/// Per-thread exception context: the handler stack and its bookkeeping.
pub struct Context {
    /// Active frames, outermost first.
    frames: SmallVec<[Frame; INLINE_FRAME_CAPACITY]>,

    /// True while this context has trap handlers accounted for.
    pub(crate) installed: bool,

    /// Previously-installed trap dispositions (private-handler policy).
    #[cfg(not(feature = "shared-handlers"))]
    pub(crate) saved: Option<crate::signals::SavedHandlers>,

    /// Operation counters.
    stats: ContextStats,
}

impl Context {
    fn new() -> Self {
        Self {
            frames: SmallVec::new(),
            installed: false,
            #[cfg(not(feature = "shared-handlers"))]
            saved: None,
            stats: ContextStats::default(),
        }
    }

    /// Pushes a frame onto the handler stack.
    #[inline]
    pub(crate) fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
        self.stats.frames_pushed += 1;
        self.stats.max_depth = self.stats.max_depth.max(self.frames.len());
    }

    /// Pops the top frame.
    #[inline]
    pub(crate) fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Returns the top frame.
    #[inline]
    pub(crate) fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Returns the top frame mutably.
    #[inline]
    pub(crate) fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    /// Returns the number of active frames.
    #[inline]
    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Iterates the frames from outermost to innermost.
    #[inline]
    pub(crate) fn frames(&self) -> impl DoubleEndedIterator<Item = &Frame> {
        self.frames.iter()
    }

    /// Counts one raised exception.
    #[inline]
    pub(crate) fn count_throw(&mut self) {
        self.stats.exceptions_raised += 1;
    }

    /// Returns a copy of this context's counters.
    #[inline]
    pub fn stats(&self) -> ContextStats {
        self.stats
    }
}

// ============================================================================
// Context Stats
// ============================================================================

/// Statistics for one context's lifetime.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContextStats {
    /// Total frames pushed.
    pub frames_pushed: u64,

    /// Total exceptions raised in this context.
    pub exceptions_raised: u64,

    /// Maximum handler-stack depth observed.
    pub max_depth: usize,
}

// ============================================================================
// Thread identity
// ============================================================================

static NEXT_IDENT: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static IDENT: Cell<u64> = const { Cell::new(0) };
}

/// Returns this thread's stable engine identity.
///
/// Identities are assigned lazily, start at 1, and are never reused within a
/// process.
pub fn thread_ident() -> u64 {
    IDENT.with(|slot| {
        let ident = slot.get();
        if ident != 0 {
            return ident;
        }
        let ident = NEXT_IDENT.fetch_add(1, Ordering::Relaxed);
        slot.set(ident);
        ident
    })
}

// ============================================================================
// Store
// ============================================================================

/// A context plus the interior mutability the store needs.
///
/// The `RefCell` is only ever borrowed by the owning thread while that
/// thread is alive; `cease_thread` borrows a cell only after its owner is
/// known to be dead, which is the caller's contract.
#[cfg(feature = "threads")]
pub(crate) struct ContextCell {
    inner: RefCell<Context>,
}

// SAFETY: access is confined to the owning thread for as long as it lives
// (the registry hands the cell to other threads only through
// `cease_thread`, whose contract is that the owner has ceased).
#[cfg(feature = "threads")]
unsafe impl Send for ContextCell {}
#[cfg(feature = "threads")]
unsafe impl Sync for ContextCell {}

#[cfg(feature = "threads")]
static REGISTRY: OnceLock<Mutex<FxHashMap<u64, Arc<ContextCell>>>> = OnceLock::new();

#[cfg(feature = "threads")]
fn registry() -> &'static Mutex<FxHashMap<u64, Arc<ContextCell>>> {
    REGISTRY.get_or_init(|| Mutex::new(FxHashMap::default()))
}

#[cfg(feature = "threads")]
thread_local! {
    static CACHED: RefCell<Option<Arc<ContextCell>>> = const { RefCell::new(None) };
}

#[cfg(not(feature = "threads"))]
thread_local! {
    static CACHED: RefCell<Option<Box<RefCell<Context>>>> = const { RefCell::new(None) };
}

/// Runs `f` on the calling thread's context, creating it first if needed.
///
/// Creation is serialized by the registry lock; the closure itself runs
/// without any lock held. Must not be re-entered from `f`.
#[cfg(feature = "threads")]
pub(crate) fn with<T>(f: impl FnOnce(&mut Context) -> T) -> T {
    let cell = CACHED.with(|slot| {
        let mut slot = slot.borrow_mut();
        if let Some(cell) = slot.as_ref() {
            return Arc::clone(cell);
        }
        let cell = Arc::new(ContextCell {
            inner: RefCell::new(Context::new()),
        });
        registry().lock().insert(thread_ident(), Arc::clone(&cell));
        *slot = Some(Arc::clone(&cell));
        cell
    });
    let mut ctx = cell.inner.borrow_mut();
    f(&mut ctx)
}

/// Single-threaded [`with`]: the one context lives in the local slot.
#[cfg(not(feature = "threads"))]
pub(crate) fn with<T>(f: impl FnOnce(&mut Context) -> T) -> T {
    CACHED.with(|slot| {
        if slot.borrow().is_none() {
            *slot.borrow_mut() = Some(Box::new(RefCell::new(Context::new())));
        }
        let slot = slot.borrow();
        let mut ctx = slot.as_ref().unwrap().borrow_mut();
        f(&mut ctx)
    })
}

/// Runs `f` on the calling thread's context if one exists.
#[cfg(feature = "threads")]
pub(crate) fn try_with<T>(f: impl FnOnce(&mut Context) -> T) -> Option<T> {
    let cell = CACHED.with(|slot| slot.borrow().as_ref().map(Arc::clone))?;
    let mut ctx = cell.inner.borrow_mut();
    Some(f(&mut ctx))
}

/// Single-threaded [`try_with`].
#[cfg(not(feature = "threads"))]
pub(crate) fn try_with<T>(f: impl FnOnce(&mut Context) -> T) -> Option<T> {
    CACHED.with(|slot| {
        let slot = slot.borrow();
        let cell = slot.as_ref()?;
        let mut ctx = cell.borrow_mut();
        Some(f(&mut ctx))
    })
}

/// Destroys the calling thread's context.
///
/// Invoked by the outermost teardown; all residual frames are freed with it.
pub(crate) fn destroy_current() {
    #[cfg(feature = "threads")]
    {
        CACHED.with(|slot| slot.borrow_mut().take());
        registry().lock().remove(&thread_ident());
    }
    #[cfg(not(feature = "threads"))]
    {
        CACHED.with(|slot| slot.borrow_mut().take());
    }
}

/// Tears down the context of a ceased thread.
///
/// Must be called by a *surviving* thread that observed the death of thread
/// `ident`; the dead thread never ran its outermost teardown, so its saved
/// signal state and frames are still accounted for. Restores that context's
/// handler bookkeeping, then frees it.
///
/// # Errors
///
/// [`ContextError::CeaseSelf`] when `ident` names the calling thread,
/// [`ContextError::UnknownThread`] when no context is registered for it.
#[cfg(feature = "threads")]
pub fn cease_thread(ident: u64) -> Result<(), ContextError> {
    if ident == thread_ident() {
        return Err(ContextError::CeaseSelf);
    }
    let cell = registry()
        .lock()
        .remove(&ident)
        .ok_or(ContextError::UnknownThread(ident))?;
    {
        let mut ctx = cell.inner.borrow_mut();
        crate::signals::restore_for(&mut ctx);
    }
    // The dead thread's TLS cache may still hold a reference; the cell is
    // freed once both are gone.
    drop(cell);
    Ok(())
}

/// Single-threaded build: there are no other threads to cease.
#[cfg(not(feature = "threads"))]
pub fn cease_thread(_ident: u64) -> Result<(), ContextError> {
    Err(ContextError::SingleThreaded)
}

/// Returns the calling thread's context counters, if it has a context.
pub fn context_stats() -> Option<ContextStats> {
    try_with(|ctx| ctx.stats())
}

// ============================================================================
// Tests
// ============================================================================
