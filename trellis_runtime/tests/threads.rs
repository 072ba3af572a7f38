//! Multi-threaded operation: context isolation and thread cleanup.

#![cfg(feature = "threads")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use trellis_runtime::{
    attempt, attempt_nested, cease_thread, context_stats, define_class, thread_ident, throw,
    ContextError, EXCEPTION,
};

define_class!(WorkerFault: EXCEPTION);
define_class!(OtherFault: EXCEPTION);

#[test]
fn exceptions_stay_on_their_thread() {
    let caught = Arc::new(AtomicUsize::new(0));
    let mut workers = Vec::new();

    for index in 0..8 {
        let caught = Arc::clone(&caught);
        workers.push(thread::spawn(move || {
            for _ in 0..32 {
                let mut name = "";
                attempt! {
                    try {
                        if index % 2 == 0 {
                            throw!(WorkerFault);
                        } else {
                            throw!(OtherFault);
                        }
                    }
                    catch (WorkerFault, e) { name = e.class().name(); }
                    catch (OtherFault, e) { name = e.class().name(); }
                    finally {}
                }
                let expected = if index % 2 == 0 {
                    "WorkerFault"
                } else {
                    "OtherFault"
                };
                assert_eq!(name, expected);
                caught.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(caught.load(Ordering::Relaxed), 8 * 32);
}

#[test]
fn idents_are_unique_per_thread() {
    let here = thread_ident();
    let mut seen = vec![here];
    for _ in 0..4 {
        let ident = thread::spawn(thread_ident).join().unwrap();
        assert!(!seen.contains(&ident));
        seen.push(ident);
    }
}

#[test]
fn context_exists_only_inside_constructs() {
    thread::spawn(|| {
        assert!(context_stats().is_none());
        attempt! {
            try { assert!(context_stats().is_some()); }
            finally {}
        }
        // The outermost teardown destroyed the context.
        assert!(context_stats().is_none());
    })
    .join()
    .unwrap();
}

#[test]
fn stats_count_frames_and_throws() {
    thread::spawn(|| {
        let mut observed = None;
        attempt! {
            try {
                attempt_nested! {
                    try { throw!(WorkerFault); }
                    catch (WorkerFault, _e) { observed = context_stats(); }
                    finally {}
                }
            }
            finally {}
        }
        let stats = observed.unwrap();
        assert_eq!(stats.frames_pushed, 2);
        assert_eq!(stats.max_depth, 2);
        assert_eq!(stats.exceptions_raised, 1);
    })
    .join()
    .unwrap();
}

// ============================================================================
// cease_thread
// ============================================================================

#[test]
fn ceasing_the_calling_thread_is_refused() {
    assert_eq!(cease_thread(thread_ident()), Err(ContextError::CeaseSelf));
}

#[test]
fn ceasing_an_unknown_thread_is_reported() {
    assert_eq!(
        cease_thread(u64::MAX),
        Err(ContextError::UnknownThread(u64::MAX))
    );
}

#[test]
fn ceasing_a_finished_thread_is_a_known_thread_error() {
    // A thread that exits through its outermost teardown unregisters
    // itself; by the time it is joined there is nothing left to cease.
    let ident = thread::spawn(|| {
        attempt! {
            try {}
            finally {}
        }
        thread_ident()
    })
    .join()
    .unwrap();
    assert_eq!(cease_thread(ident), Err(ContextError::UnknownThread(ident)));
}
