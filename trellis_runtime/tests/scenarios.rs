//! End-to-end construct scenarios: dispatch, early returns, ordered
//! `finally` execution, overrides, rethrow and traces.

use trellis_runtime::{
    attempt, attempt_nested, define_class, pending, ret, scope, throw, Scope, EXCEPTION, THROWABLE,
};

define_class!(Level1: EXCEPTION);
define_class!(Level2: Level1);
define_class!(Boom: EXCEPTION);
define_class!(Deep: EXCEPTION);

// ============================================================================
// Subclass catch
// ============================================================================

#[test]
fn subclass_is_caught_by_ancestor_clause() {
    let mut message = String::new();
    attempt! {
        try { throw!(Level2); }
        catch (Level1, e) { message = e.message(); }
        finally {}
    }
    assert!(message.starts_with("Level2: file \""), "got: {message}");
    assert!(message.ends_with("."), "got: {message}");
}

#[test]
fn first_matching_clause_wins() {
    let mut hits = Vec::new();
    attempt! {
        try { throw!(Level2); }
        catch (Boom, _e) { hits.push("boom"); }
        catch (Level2, _e) { hits.push("level2"); }
        catch (Level1, _e) { hits.push("level1"); }
        finally {}
    }
    assert_eq!(hits, ["level2"]);
}

#[test]
fn unrelated_clause_does_not_match() {
    let mut caught_by = "";
    attempt! {
        try {
            attempt_nested! {
                try { throw!(Boom); }
                catch (Level1, _e) { caught_by = "level1"; }
                finally {}
            }
        }
        catch (Boom, _e) { caught_by = "outer"; }
        finally {}
    }
    assert_eq!(caught_by, "outer");
}

// ============================================================================
// Finally after early return
// ============================================================================

fn return_six() -> i32 {
    attempt! {
        try { ret!(6); }
        catch (THROWABLE, _e) { panic!("a deferred return is not catchable"); }
        finally {}
    }
    0
}

fn return_seven() -> i32 {
    attempt! {
        try { ret!(6); }
        catch (THROWABLE, _e) { panic!("a deferred return is not catchable"); }
        finally { ret!(7); }
    }
    0
}

#[test]
fn early_return_skips_catch_and_returns_value() {
    assert_eq!(return_six(), 6);
}

#[test]
fn return_in_finally_overrides_earlier_return() {
    assert_eq!(return_seven(), 7);
}

// ============================================================================
// Ordered finally execution
// ============================================================================

fn three_nested_returns(log: &mut Vec<&'static str>) -> i32 {
    attempt! {
        try {
            attempt_nested! {
                try {
                    attempt_nested! {
                        try { ret!(1); }
                        finally { log.push("A"); }
                    }
                }
                finally { log.push("B"); }
            }
        }
        finally { log.push("C"); }
    }
    0
}

#[test]
fn return_runs_every_enclosing_finally_in_order() {
    let mut log = Vec::new();
    assert_eq!(three_nested_returns(&mut log), 1);
    assert_eq!(log, ["A", "B", "C"]);
}

// ============================================================================
// Catch + finally override
// ============================================================================

fn catch_then_finally_override(log: &mut Vec<&'static str>) -> i32 {
    attempt! {
        try {
            attempt_nested! {
                try {
                    attempt_nested! {
                        try { throw!(Boom); }
                        catch (Boom, _e) { ret!(1); }
                        finally {
                            log.push("A");
                            ret!(2);
                        }
                    }
                }
                catch (Boom, _e) { log.push("Magic"); }
                finally { log.push("B"); }
            }
        }
        finally { log.push("C"); }
    }
    0
}

#[test]
fn finally_return_overrides_catch_return_and_propagates() {
    let mut log = Vec::new();
    assert_eq!(catch_then_finally_override(&mut log), 2);
    assert_eq!(log, ["A", "B", "C"]);
}

#[test]
fn throw_in_finally_overrides_pending_exception() {
    let mut caught = "";
    attempt! {
        try {
            attempt_nested! {
                try { throw!(Level1); }
                finally { throw!(Boom); }
            }
        }
        catch (Level1, _e) { caught = "level1"; }
        catch (Boom, _e) { caught = "boom"; }
        finally {}
    }
    assert_eq!(caught, "boom");
}

#[test]
fn throw_in_catch_is_not_reconsidered_by_siblings() {
    let mut trail = Vec::new();
    attempt! {
        try {
            attempt_nested! {
                try { throw!(Level2); }
                catch (Level2, _e) {
                    trail.push("inner-catch");
                    throw!(Boom);
                }
                catch (Boom, _e) { trail.push("sibling"); }
                finally { trail.push("inner-finally"); }
            }
        }
        catch (Boom, _e) { trail.push("outer-catch"); }
        finally {}
    }
    assert_eq!(trail, ["inner-catch", "inner-finally", "outer-catch"]);
}

// ============================================================================
// Propagation across function activations
// ============================================================================

fn descend(depth: usize, log: &mut Vec<usize>) -> usize {
    attempt! {
        try {
            if depth == 0 {
                throw!(Deep);
            }
            let _ = descend(depth - 1, log);
        }
        finally { log.push(depth); }
    }
    depth
}

#[test]
fn propagation_runs_each_activation_finally_inward_out() {
    let mut log = Vec::new();
    let mut caught = false;
    attempt! {
        try { let _ = descend(3, &mut log); }
        catch (Deep, _e) { caught = true; }
        finally {}
    }
    assert!(caught);
    assert_eq!(log, [0, 1, 2, 3]);
}

fn returns_from_callee() -> i32 {
    attempt! {
        try { ret!(40); }
        finally {}
    }
    -1
}

#[test]
fn deferred_return_is_consumed_at_the_function_boundary() {
    let mut result = 0;
    attempt! {
        try { result = returns_from_callee() + 2; }
        finally {}
    }
    // The callee's return must not abort the caller's construct.
    assert_eq!(result, 42);
}

// ============================================================================
// Rethrow
// ============================================================================

#[test]
fn rethrow_preserves_the_original_origin() {
    let mut first = String::new();
    let mut second = String::new();
    attempt! {
        try {
            attempt_nested! {
                try { throw!(Boom); }
                catch (Boom, e) {
                    first = e.message();
                    throw!(e);
                }
                finally {}
            }
        }
        catch (Boom, e) { second = e.message(); }
        finally {}
    }
    assert_eq!(first, second);
}

#[test]
fn rethrow_keeps_attached_data() {
    let mut seen = 0_i64;
    attempt! {
        try {
            attempt_nested! {
                try { throw!(Boom, -7_i64); }
                catch (Boom, e) { throw!(e); }
                finally {}
            }
        }
        catch (Boom, e) { seen = *e.data_as::<i64>().unwrap(); }
        finally {}
    }
    assert_eq!(seen, -7);
}

// ============================================================================
// Scope and pending accessors
// ============================================================================

#[test]
fn scope_tracks_the_active_block() {
    assert_eq!(scope(), Scope::Outside);
    let mut seen = Vec::new();
    attempt! {
        try {
            seen.push(scope());
            throw!(Boom);
        }
        catch (Boom, _e) { seen.push(scope()); }
        finally { seen.push(scope()); }
    }
    assert_eq!(seen, [Scope::Try, Scope::Catch, Scope::Finally]);
    assert_eq!(scope(), Scope::Outside);
}

#[test]
fn pending_is_set_for_an_uncaught_exception_in_finally() {
    let mut was_pending = false;
    let mut caught_pending = true;
    attempt! {
        try {
            attempt_nested! {
                try { throw!(Boom); }
                finally { was_pending = pending(); }
            }
        }
        catch (Boom, _e) { caught_pending = pending(); }
        finally {}
    }
    assert!(was_pending);
    assert!(!caught_pending);
}

// ============================================================================
// Trace printer
// ============================================================================

#[test]
fn try_trace_walks_innermost_out() {
    let mut trace = Vec::new();
    attempt! {
        try {
            attempt_nested! {
                try { throw!(Boom); }
                catch (Boom, e) {
                    e.print_try_trace(&mut trace).unwrap();
                }
                finally {}
            }
        }
        finally {}
    }
    let text = String::from_utf8(trace).unwrap();
    let mut lines = text.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("Boom occurred"), "got: {header}");
    let frames: Vec<&str> = lines.collect();
    assert_eq!(frames.len(), 2);
    for frame in frames {
        assert!(frame.starts_with("        in 'try' at "), "got: {frame}");
    }
}

// ============================================================================
// Finally runs exactly once per frame
// ============================================================================

#[test]
fn finally_runs_exactly_once_on_every_path() {
    let mut counts = [0_u32; 3];

    attempt! {
        try {}
        finally { counts[0] += 1; }
    }

    attempt! {
        try { throw!(Boom); }
        catch (Boom, _e) {}
        finally { counts[1] += 1; }
    }

    fn with_return(count: &mut u32) -> u8 {
        attempt! {
            try { ret!(9); }
            finally { *count += 1; }
        }
        0
    }
    assert_eq!(with_return(&mut counts[2]), 9);

    assert_eq!(counts, [1, 1, 1]);
}
