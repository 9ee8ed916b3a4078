//! Single-flight guard for the ask-the-model-and-relay operation.
//!
//! Analysis triggers arrive from several concurrent places at once: the
//! frame pump, transcription data packets, and RPC calls. At most one
//! analysis may be in flight; extra triggers are dropped, never queued.
//! Losing a trigger is acceptable, running two analyses is not, so the
//! in-flight flag is claimed with a compare-and-swap rather than a read
//! followed by a write.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared trigger state for analysis runs.
///
/// `pending_question` holds the most recent unconsumed user prompt. New
/// questions overwrite it; it is consumed the moment an analysis run picks
/// it up.
#[derive(Debug, Default)]
pub struct AnalysisGuard {
    in_flight: AtomicBool,
    pending: Mutex<Option<String>>,
}

/// Permit for one analysis run. Releasing is tied to `Drop` so the flag is
/// reset on every exit path, including unwinding.
#[derive(Debug)]
pub struct InFlight<'a> {
    guard: &'a AnalysisGuard,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.guard.in_flight.store(false, Ordering::Release);
    }
}

impl AnalysisGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the in-flight slot, or returns `None` if an analysis is
    /// already running.
    pub fn try_acquire(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| InFlight { guard: self })
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Records the latest user question, replacing any unconsumed one.
    pub fn note_question(&self, text: &str) {
        *self.pending_slot() = Some(text.to_owned());
    }

    /// Consumes the pending question, if any.
    pub fn take_pending(&self) -> Option<String> {
        self.pending_slot().take()
    }

    pub fn has_pending(&self) -> bool {
        self.pending_slot().is_some()
    }

    // The lock is only ever held for a field read or write, never across an
    // await point.
    fn pending_slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_permit_at_a_time() {
        let guard = AnalysisGuard::new();

        let first = guard.try_acquire();
        assert!(first.is_some());
        assert!(guard.is_in_flight());
        assert!(guard.try_acquire().is_none());
        assert!(guard.try_acquire().is_none());

        drop(first);
        assert!(!guard.is_in_flight());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn questions_overwrite_and_are_consumed_once() {
        let guard = AnalysisGuard::new();
        assert!(!guard.has_pending());

        guard.note_question("first");
        guard.note_question("second");
        assert_eq!(guard.take_pending().as_deref(), Some("second"));
        assert_eq!(guard.take_pending(), None);
    }

    #[test]
    fn permit_release_survives_a_panic() {
        let guard = AnalysisGuard::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _permit = guard.try_acquire().expect("slot free");
            panic!("analysis blew up");
        }));
        assert!(result.is_err());
        assert!(!guard.is_in_flight());
    }

    #[test]
    fn concurrent_claims_yield_exactly_one_winner() {
        use std::sync::{Arc, Barrier};
        use std::sync::atomic::AtomicUsize;

        const THREADS: usize = 8;
        let guard = Arc::new(AnalysisGuard::new());
        let winners = Arc::new(AtomicUsize::new(0));
        // Every thread attempts between the two barrier crossings, so the
        // winner still holds its permit while the others try.
        let barrier = Arc::new(Barrier::new(THREADS));
        let mut handles = Vec::new();

        for _ in 0..THREADS {
            let guard = Arc::clone(&guard);
            let winners = Arc::clone(&winners);
            let barrier = Arc::clone(&barrier);
            handles.push(std::thread::spawn(move || {
                barrier.wait();
                let permit = guard.try_acquire();
                if permit.is_some() {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
                barrier.wait();
                drop(permit);
            }));
        }
        for handle in handles {
            handle.join().expect("thread panicked");
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
