//! The construct macros: `attempt!`, `attempt_nested!`, `throw!`, `ret!`.
//!
//! A construct is written as one block, exactly in the shape the engine
//! executes it:
//!
//! ```
//! use trellis_runtime::{attempt, ret, throw, EXCEPTION};
//!
//! fn classify(byte: u8) -> &'static str {
//!     attempt! {
//!         try {
//!             if byte > 0x7f {
//!                 throw!(EXCEPTION);
//!             }
//!             ret!("ascii");
//!         }
//!         catch (EXCEPTION, _e) {
//!             ret!("high");
//!         }
//!         finally {}
//!     }
//!     unreachable!()
//! }
//!
//! assert_eq!(classify(0x20), "ascii");
//! assert_eq!(classify(0xee), "high");
//! ```
//!
//! `attempt!` is the function-level form: a deferred return reaching its
//! boundary performs the native early return. A construct written lexically
//! *inside* a `try`/`catch`/`finally` block of the same function must use
//! `attempt_nested!` instead, which hands a deferred return onward to the
//! enclosing construct so every `finally` between the `ret!` and the
//! function boundary still runs. A construct in a *called* function is a
//! new function boundary and uses `attempt!` again.

/// A function-level `try … catch* … finally` construct.
///
/// Zero or more `catch (CLASS, binding)` clauses between the `try` block
/// and the mandatory `finally` block (which may be empty). Clauses are
/// tried in source order against the pending exception's class, ancestors
/// matching subclasses; only the first match runs.
///
/// Expands as a statement. A deferred return ([`ret!`](crate::ret)) that
/// reaches this construct returns from the enclosing function.
#[macro_export]
macro_rules! attempt {
    (try $body:block $(catch ($class:path, $e:ident) $cbody:block)* finally $fbody:block) => {
        match $crate::__construct!($body, [$(($class, $e, $cbody))*], $fbody) {
            $crate::Completion::Return(__value) => return __value,
            $crate::Completion::Normal => {}
        }
    };
}

/// A `try … catch* … finally` construct lexically nested inside another
/// construct's block in the same function.
///
/// Identical to [`attempt!`](crate::attempt) except that a deferred return
/// propagates to the enclosing construct instead of returning, so the
/// enclosing `finally` blocks run before the function finally returns.
#[macro_export]
macro_rules! attempt_nested {
    (try $body:block $(catch ($class:path, $e:ident) $cbody:block)* finally $fbody:block) => {
        match $crate::__construct!($body, [$(($class, $e, $cbody))*], $fbody) {
            $crate::Completion::Return(__value) => {
                return $crate::Flow::Return(__value);
            }
            $crate::Completion::Normal => {}
        }
    };
}

/// Shared expansion of the two construct forms.
#[doc(hidden)]
#[macro_export]
macro_rules! __construct {
    ($body:block, [$(($class:path, $e:ident, $cbody:block))*], $fbody:block) => {{
        static __SITE: $crate::CheckSite = $crate::CheckSite::new();
        $crate::protocol::run_construct(
            ::core::file!(),
            ::core::line!(),
            &__SITE,
            &[$($crate::ClauseSpec {
                class: &$class,
                line: ::core::line!(),
            }),*],
            |__phase| {
                match __phase {
                    $crate::Phase::Try => {
                        $body;
                    }
                    #[allow(unused_variables, unused_mut, unreachable_code)]
                    $crate::Phase::Catch(__index, __exc) => {
                        let mut __at = 0_usize;
                        $(
                            if __index == __at {
                                let $e: &$crate::Exception = __exc;
                                $cbody;
                                return $crate::Flow::Done;
                            }
                            __at += 1;
                        )*
                        let _ = __at;
                        ::core::unreachable!("catch clause index out of range");
                    }
                    $crate::Phase::Finally => {
                        $fbody;
                    }
                }
                $crate::Flow::Done
            },
        )
    }};
}

/// Raises an exception.
///
/// - `throw!(CLASS)` — fresh throw of a class, stamped with the call site.
/// - `throw!(CLASS, data)` — fresh throw with attached user data, readable
///   in a clause through [`Exception::data_as`](crate::Exception::data_as).
/// - `throw!(exc)` where `exc` is a caught [`Exception`](crate::Exception)
///   — precise rethrow: class, data and the *original* origin are kept.
///
/// Inside a `try` block control transfers to the construct's catch
/// clauses; inside a `catch` or `finally` block it transfers to the
/// enclosing teardown (clauses are not reconsidered). With no active `try`
/// anywhere on the thread, the exception is lost: a notice is printed and
/// execution continues after the macro.
#[macro_export]
macro_rules! throw {
    ($what:expr) => {{
        use $crate::Raisable as _;
        (&$what).raise(::core::file!(), ::core::line!())
    }};
    ($class:expr, $data:expr) => {
        $crate::protocol::throw_with(&$class, $data, ::core::file!(), ::core::line!())
    };
}

/// Deferred return from inside a construct block.
///
/// Legal in `try`, `catch` and `finally` blocks. Every `finally` between
/// here and the function boundary runs before the value is returned; a
/// `ret!` in a `finally` overrules a pending exception or an earlier
/// deferred return. Outside a construct, use a plain `return`.
#[macro_export]
macro_rules! ret {
    () => {
        return $crate::Flow::Return(())
    };
    ($value:expr) => {
        return $crate::Flow::Return($value)
    };
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use trellis_core::{define_class, EXCEPTION};

    define_class!(MacroLevel1: EXCEPTION);
    define_class!(MacroLevel2: MacroLevel1);

    // ════════════════════════════════════════════════════════════════════════
    // Grammar Tests
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_no_catch_clauses() {
        let mut ran = false;
        attempt! {
            try {}
            finally { ran = true; }
        }
        assert!(ran);
    }

    #[test]
    fn test_subclass_matches_ancestor_clause() {
        let mut name = "";
        attempt! {
            try { throw!(MacroLevel2); }
            catch (MacroLevel1, e) { name = e.class().name(); }
            finally {}
        }
        assert_eq!(name, "MacroLevel2");
    }

    #[test]
    fn test_shared_locals_across_blocks() {
        let mut log: Vec<&str> = Vec::new();
        attempt! {
            try { log.push("try"); }
            catch (EXCEPTION, _e) { log.push("catch"); }
            finally { log.push("finally"); }
        }
        assert_eq!(log, ["try", "finally"]);
    }

    #[test]
    fn test_throw_with_data() {
        let mut seen = 0_u64;
        attempt! {
            try { throw!(MacroLevel1, 31_u64); }
            catch (MacroLevel1, e) { seen = *e.data_as::<u64>().unwrap(); }
            finally {}
        }
        assert_eq!(seen, 31);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Deferred-Return Tests
    // ════════════════════════════════════════════════════════════════════════

    fn early_return() -> i32 {
        attempt! {
            try { ret!(6); }
            catch (EXCEPTION, _e) { unreachable!(); }
            finally {}
        }
        0
    }

    fn finally_overrides() -> i32 {
        attempt! {
            try { ret!(6); }
            finally { ret!(7); }
        }
        0
    }

    #[test]
    fn test_early_return_skips_catch() {
        assert_eq!(early_return(), 6);
    }

    #[test]
    fn test_finally_return_wins() {
        assert_eq!(finally_overrides(), 7);
    }

    fn nested_returns(log: &mut Vec<&'static str>) -> i32 {
        attempt! {
            try {
                attempt_nested! {
                    try { ret!(1); }
                    finally { log.push("inner"); }
                }
            }
            finally { log.push("outer"); }
        }
        0
    }

    #[test]
    fn test_nested_return_runs_every_finally() {
        let mut log = Vec::new();
        assert_eq!(nested_returns(&mut log), 1);
        assert_eq!(log, ["inner", "outer"]);
    }
}
