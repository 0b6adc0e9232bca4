//! The single entry point for every ingested job payload.
//!
//! Both event sources (socket push and poll pull) feed raw payloads
//! through [`Dispatcher::handle_job`], which normalizes, filters,
//! deduplicates, and routes to the stage executor. The function is total:
//! malformed payloads produce a warning and return.

use crate::runtime::ledger::StageLedger;
use crate::runtime::stages::StageExecutor;
use acp_types::{normalize_address, phase_label, Job, Phase};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Which channel delivered an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Socket,
    Poll,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Socket => "socket",
            Source::Poll => "poll",
        }
    }
}

pub struct Dispatcher {
    wallet_lc: String,
    ledger: Arc<StageLedger>,
    stages: StageExecutor,
}

impl Dispatcher {
    /// `wallet` is normalized to lowercase internally.
    pub fn new(wallet: impl AsRef<str>, ledger: Arc<StageLedger>, stages: StageExecutor) -> Self {
        Self {
            wallet_lc: wallet.as_ref().trim().to_lowercase(),
            ledger,
            stages,
        }
    }

    pub fn wallet(&self) -> &str {
        &self.wallet_lc
    }

    /// Process one raw job payload from either event source.
    pub async fn handle_job(&self, raw: &Value, source: Source) {
        let Some(job) = Job::from_value(raw) else {
            warn!(
                component = "dispatcher",
                source = source.as_str(),
                "dropping non-object job payload"
            );
            return;
        };
        let Some(job_id) = job.id else {
            warn!(
                component = "dispatcher",
                source = source.as_str(),
                "dropping job payload without id"
            );
            return;
        };

        if let Some(provider) = job.provider_address.as_deref().and_then(normalize_address) {
            if provider != self.wallet_lc {
                return;
            }
        }

        let Some(phase) = job.phase else {
            warn!(
                component = "dispatcher",
                source = source.as_str(),
                job_id,
                phase = %raw.get("phase").map(phase_label).unwrap_or_else(|| "UNKNOWN".into()),
                "dropping job with unknown phase"
            );
            return;
        };

        if !self.ledger.begin(job_id) {
            debug!(
                component = "dispatcher",
                job_id, "job already in flight, dropping duplicate event"
            );
            return;
        }

        info!(
            component = "dispatcher",
            job_id,
            phase = phase.label(),
            source = source.as_str(),
            "job event"
        );

        let outcome = match phase {
            Phase::Request | Phase::Negotiation => self.stages.accept_stage(&job).await,
            // The backend has surfaced the ready-to-execute signal under
            // either phase across versions; memo/deliverable checks inside
            // the stage are the true gate.
            Phase::Transaction | Phase::Evaluation => self.stages.deliver_stage(&job).await,
            Phase::Completed | Phase::Rejected | Phase::Expired => Ok(()),
        };
        if let Err(err) = outcome {
            error!(
                component = "dispatcher",
                job_id,
                phase = phase.label(),
                error = %err,
                "stage execution failed"
            );
        }

        self.ledger.finish(job_id);
    }
}
