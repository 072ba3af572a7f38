//! Catch-list validation (debug builds).
//!
//! At `try` entry, before any user code, the clause list is checked once
//! per source site:
//!
//! - a class listed twice is a **duplicate** — the second clause can never
//!   run;
//! - a class preceded by one of its ancestors is **superfluous** — the
//!   ancestor's clause shadows it;
//! - an empty clause list gets a warning — the construct catches nothing.
//!
//! Diagnostics go to the diagnostic channel. A site that was checked stays
//! silent forever after, so a `try` inside a loop reports once. Compiled
//! only under `debug_assertions`, the debug-mode switch of this engine.

use smallvec::SmallVec;
use std::sync::atomic::{AtomicBool, Ordering};
use trellis_core::class::Class;
use trellis_core::diag;

/// Inline capacity for the clause comparison list.
const INLINE_CHECKS: usize = 4;

/// Per-`try`-site "already checked" flag.
///
/// One static per source-level construct; the construct macros mint it.
pub struct CheckSite(AtomicBool);

impl CheckSite {
    /// A fresh, unchecked site.
    #[inline]
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Claims the site. True exactly once, for the first caller.
    #[inline]
    pub(crate) fn claim(&self) -> bool {
        !self.0.swap(true, Ordering::Relaxed)
    }
}

impl Default for CheckSite {
    fn default() -> Self {
        Self::new()
    }
}

/// Validates a construct's clause list, once per site.
///
/// `clauses` are `(class, line)` pairs in source order. A clause that draws
/// a diagnostic is excluded from later comparisons, so one bad clause does
/// not cascade.
pub(crate) fn validate(
    site: &CheckSite,
    file: &'static str,
    line: u32,
    clauses: &[(&'static Class, u32)],
) {
    if !site.claim() {
        return;
    }

    if clauses.is_empty() {
        diag!("Warning: No catch clause(s): file \"{file}\", line {line}.");
        return;
    }

    let mut clean: SmallVec<[(&'static Class, u32); INLINE_CHECKS]> = SmallVec::new();
    for &(class, clause_line) in clauses {
        let mut flagged = false;
        for &(earlier, earlier_line) in &clean {
            if class.is(earlier) {
                diag!(
                    "Duplicate catch({}): file \"{file}\", line {clause_line}; \
                     already caught at line {earlier_line}.",
                    class.name()
                );
                flagged = true;
                break;
            }
            if class.is_derived(earlier) {
                diag!(
                    "Superfluous catch({}): file \"{file}\", line {clause_line}; \
                     already caught by {} at line {earlier_line}.",
                    class.name(),
                    earlier.name()
                );
                flagged = true;
                break;
            }
        }
        if !flagged {
            clean.push((class, clause_line));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex, OnceLock};
    use trellis_core::{define_class, EXCEPTION, RUNTIME_EXCEPTION, THROWABLE};

    define_class!(Narrow: RUNTIME_EXCEPTION);

    /// Sink that appends to a shared buffer.
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Serializes tests that capture the (process-wide) diagnostic channel.
    fn diag_lock() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(Mutex::default)
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Captures diagnostic output, keeping only the lines this test minted
    /// (other tests in the binary may emit concurrently).
    fn captured(run: impl FnOnce()) -> Vec<String> {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let old = diag::set_sink(Some(Box::new(Capture(Arc::clone(&buf)))));
        run();
        diag::set_sink(old);
        let bytes = buf.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .filter(|line| line.contains("\"x.rs\""))
            .map(str::to_owned)
            .collect()
    }

    // ════════════════════════════════════════════════════════════════════════
    // Diagnostic Tests
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_duplicate_clause() {
        let _guard = diag_lock();
        let site = CheckSite::new();
        let out = captured(|| {
            validate(&site, "x.rs", 5, &[(&EXCEPTION, 6), (&EXCEPTION, 7)]);
        });
        assert_eq!(
            out,
            ["Duplicate catch(Exception): file \"x.rs\", line 7; already caught at line 6."]
        );
    }

    #[test]
    fn test_superfluous_subclass_after_ancestor() {
        let _guard = diag_lock();
        let site = CheckSite::new();
        let out = captured(|| {
            validate(&site, "x.rs", 5, &[(&THROWABLE, 6), (&EXCEPTION, 7)]);
        });
        assert_eq!(
            out,
            ["Superfluous catch(Exception): file \"x.rs\", line 7; \
              already caught by Throwable at line 6."]
        );
    }

    #[test]
    fn test_specific_before_general_is_clean() {
        let _guard = diag_lock();
        let site = CheckSite::new();
        let out = captured(|| {
            validate(&site, "x.rs", 5, &[(&Narrow, 6), (&RUNTIME_EXCEPTION, 7)]);
        });
        assert!(out.is_empty(), "got: {out:?}");
    }

    #[test]
    fn test_empty_clause_list_warns() {
        let _guard = diag_lock();
        let site = CheckSite::new();
        let out = captured(|| {
            validate(&site, "x.rs", 9, &[]);
        });
        assert_eq!(out, ["Warning: No catch clause(s): file \"x.rs\", line 9."]);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Once-Per-Site Tests
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_site_reports_only_once() {
        let _guard = diag_lock();
        let site = CheckSite::new();
        let clauses = [(&THROWABLE, 6), (&EXCEPTION, 7)];
        let out = captured(|| {
            validate(&site, "x.rs", 5, &clauses);
            validate(&site, "x.rs", 5, &clauses);
            validate(&site, "x.rs", 5, &clauses);
        });
        assert_eq!(out.len(), 1);
        assert!(out[0].starts_with("Superfluous"), "got: {out:?}");
    }

    #[test]
    fn test_flagged_clause_does_not_cascade() {
        let _guard = diag_lock();
        let site = CheckSite::new();
        // The duplicate Throwable is flagged and excluded; the Exception
        // clause is then compared against the single clean Throwable only,
        // so exactly two diagnostics come out.
        let out = captured(|| {
            validate(
                &site,
                "x.rs",
                5,
                &[(&THROWABLE, 6), (&THROWABLE, 7), (&EXCEPTION, 8)],
            );
        });
        assert_eq!(out.len(), 2);
        assert!(out[0].starts_with("Duplicate catch(Throwable)"), "got: {out:?}");
        assert!(out[1].starts_with("Superfluous catch(Exception)"), "got: {out:?}");
    }
}
