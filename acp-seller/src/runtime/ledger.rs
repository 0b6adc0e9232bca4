//! In-memory stage tracking.
//!
//! The ledger records which side-effect stages have been performed for
//! each job during the current process lifetime, plus the set of jobs
//! with a dispatcher invocation currently in flight. It is rebuilt from
//! memo/deliverable observations after a restart; the backend remains the
//! source of truth.

use dashmap::{DashMap, DashSet};

/// Per-job stage flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageFlags {
    pub accepted: bool,
    pub delivered: bool,
}

/// Process-wide idempotency map. All mutations happen inside the per-job
/// in-flight critical section claimed via [`StageLedger::begin`].
#[derive(Debug, Default)]
pub struct StageLedger {
    stages: DashMap<u64, StageFlags>,
    in_flight: DashSet<u64>,
}

impl StageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the in-flight slot for a job. Returns `false` when another
    /// dispatcher invocation already holds it.
    pub fn begin(&self, job_id: u64) -> bool {
        self.in_flight.insert(job_id)
    }

    /// Release the in-flight slot.
    pub fn finish(&self, job_id: u64) {
        self.in_flight.remove(&job_id);
    }

    pub fn is_accepted(&self, job_id: u64) -> bool {
        self.stages.get(&job_id).is_some_and(|f| f.accepted)
    }

    pub fn mark_accepted(&self, job_id: u64) {
        self.stages.entry(job_id).or_default().accepted = true;
    }

    pub fn is_delivered(&self, job_id: u64) -> bool {
        self.stages.get(&job_id).is_some_and(|f| f.delivered)
    }

    pub fn mark_delivered(&self, job_id: u64) {
        self.stages.entry(job_id).or_default().delivered = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn in_flight_slot_is_exclusive() {
        let ledger = StageLedger::new();
        assert!(ledger.begin(7));
        assert!(!ledger.begin(7));
        assert!(ledger.begin(8));
        ledger.finish(7);
        assert!(ledger.begin(7));
    }

    #[test]
    fn stage_flags_are_independent() {
        let ledger = StageLedger::new();
        ledger.mark_accepted(1);
        assert!(ledger.is_accepted(1));
        assert!(!ledger.is_delivered(1));
        ledger.mark_delivered(1);
        assert!(ledger.is_accepted(1) && ledger.is_delivered(1));
        assert!(!ledger.is_accepted(2));
    }

    #[test]
    fn concurrent_claims_admit_exactly_one_winner() {
        let ledger = Arc::new(StageLedger::new());
        let claims: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || ledger.begin(42))
            })
            .collect();
        let winners = claims
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
