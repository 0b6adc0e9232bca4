//! Stage execution: the seller-side side-effect bundles.
//!
//! The accept stage issues the accept decision and the payment request;
//! the deliver stage runs the offering's `execute_job` and submits the
//! deliverable. Both stages are idempotent against duplicate events: the
//! ledger short-circuits re-observations within this process lifetime and
//! memo/deliverable observations rebuild effective state after a restart.

use crate::delivery::{ensure_job_dir, write_json_file, SNAPSHOT_FILE};
use crate::errors::{SellerError, SellerResult};
use crate::offering::{JobContext, OfferingRegistry, Validation};
use crate::runtime::ledger::StageLedger;
use acp_client::{with_retry, RetryOptions, SellerApi};
use acp_types::{
    resolve_offering_name, resolve_service_requirements, AcceptRequest, DeliverRequest, Job,
    PayableDetail, PaymentRequirement, Phase,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

const REJECT_UNRESOLVED_OFFERING: &str = "Invalid offering name (could not resolve)";
const ACCEPT_REASON: &str = "Job accepted";
const DEFAULT_PAYMENT_CONTENT: &str = "Request accepted";

/// Executes the accept and deliver stages for dispatched jobs.
pub struct StageExecutor {
    api: Arc<dyn SellerApi>,
    registry: Arc<OfferingRegistry>,
    ledger: Arc<StageLedger>,
    delivery_root: PathBuf,
    retry: RetryOptions,
}

impl StageExecutor {
    pub fn new(
        api: Arc<dyn SellerApi>,
        registry: Arc<OfferingRegistry>,
        ledger: Arc<StageLedger>,
        delivery_root: PathBuf,
        retry: RetryOptions,
    ) -> Self {
        Self {
            api,
            registry,
            ledger,
            delivery_root,
            retry,
        }
    }

    async fn reject(&self, job_id: u64, reason: &str) -> SellerResult<()> {
        let request = AcceptRequest::reject(reason);
        with_retry("accept-or-reject", &self.retry, || {
            self.api.accept_or_reject_job(job_id, &request)
        })
        .await?;
        info!(component = "stage", job_id, reason, "job rejected");
        Ok(())
    }

    /// Build the handler context, creating the per-job directory and a
    /// snapshot artifact as side effects.
    async fn build_context<'a>(
        &self,
        job_id: u64,
        offering_name: &str,
        job: &'a Job,
    ) -> SellerResult<JobContext<'a>> {
        let job_dir = ensure_job_dir(&self.delivery_root, job_id).await?;
        // The snapshot carries routing metadata only; requirements and
        // memo bodies stay out of it.
        let snapshot = json!({
            "jobId": job_id,
            "phase": job.phase.map(Phase::label),
            "offering": offering_name,
            "clientAddress": job.client_address,
            "providerAddress": job.provider_address,
            "price": job.price,
            "observedAt": chrono::Utc::now().to_rfc3339(),
        });
        write_json_file(&job_dir, SNAPSHOT_FILE, &snapshot).await?;
        Ok(JobContext {
            job_id,
            offering_name: offering_name.to_string(),
            delivery_root: self.delivery_root.clone(),
            job_dir,
            job,
        })
    }

    /// Accept stage: accept the job and request payment, at most once.
    pub async fn accept_stage(&self, job: &Job) -> SellerResult<()> {
        let Some(job_id) = job.id else {
            warn!(component = "stage", "accept stage without job id");
            return Ok(());
        };

        // A transaction memo means the payment request already went out,
        // whether or not this process issued it.
        if job.has_memo_with_next_phase(Phase::Transaction) {
            debug!(
                component = "stage",
                job_id, "transaction memo present, treating as accepted"
            );
            self.ledger.mark_accepted(job_id);
            return Ok(());
        }
        if self.ledger.is_accepted(job_id) {
            return Ok(());
        }

        let Some(offering_name) = resolve_offering_name(job) else {
            self.reject(job_id, REJECT_UNRESOLVED_OFFERING).await?;
            self.ledger.mark_accepted(job_id);
            return Ok(());
        };
        let requirements = resolve_service_requirements(job);

        let (config, handlers) = match self.registry.load_offering(&offering_name) {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!(
                    component = "stage",
                    job_id,
                    offering = %offering_name,
                    error = %err,
                    "offering load failed"
                );
                self.reject(
                    job_id,
                    &format!("Offering not configured locally: {offering_name}"),
                )
                .await?;
                self.ledger.mark_accepted(job_id);
                return Ok(());
            }
        };

        let ctx = self.build_context(job_id, &offering_name, job).await?;

        let validation = match handlers.validate_requirements(&requirements, &ctx).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    component = "stage",
                    job_id,
                    offering = %offering_name,
                    error = %err,
                    "requirement validation errored"
                );
                Validation::Invalid { reason: None }
            }
        };
        if let Validation::Invalid { reason } = validation {
            let reason = reason.unwrap_or_else(|| "Validation failed".to_string());
            self.reject(job_id, &reason).await?;
            self.ledger.mark_accepted(job_id);
            return Ok(());
        }

        let accept = AcceptRequest::accept(ACCEPT_REASON);
        with_retry("accept-or-reject", &self.retry, || {
            self.api.accept_or_reject_job(job_id, &accept)
        })
        .await?;

        let funds = if config.required_funds {
            handlers
                .request_additional_funds(&requirements, &ctx)
                .await?
        } else {
            None
        };
        let payable_detail = funds.as_ref().map(|f| PayableDetail {
            amount: f.amount,
            token_address: f.token_address.clone(),
            recipient: Some(f.recipient.clone()),
        });
        let content = match handlers.request_payment(&requirements, &ctx).await? {
            Some(content) => content,
            None => funds
                .as_ref()
                .and_then(|f| f.content.clone())
                .unwrap_or_else(|| DEFAULT_PAYMENT_CONTENT.to_string()),
        };

        let requirement = PaymentRequirement {
            content,
            payable_detail,
        };
        with_retry("request-payment", &self.retry, || {
            self.api.request_payment(job_id, &requirement)
        })
        .await?;

        self.ledger.mark_accepted(job_id);
        info!(
            component = "stage",
            job_id,
            offering = %offering_name,
            "accept stage complete"
        );
        Ok(())
    }

    /// Deliver stage: execute the offering and submit the deliverable, at
    /// most once.
    pub async fn deliver_stage(&self, job: &Job) -> SellerResult<()> {
        let Some(job_id) = job.id else {
            warn!(component = "stage", "deliver stage without job id");
            return Ok(());
        };

        if job.has_deliverable() {
            debug!(
                component = "stage",
                job_id, "deliverable already on job, treating as delivered"
            );
            self.ledger.mark_delivered(job_id);
            return Ok(());
        }
        if self.ledger.is_delivered(job_id) {
            return Ok(());
        }

        let Some(offering_name) = resolve_offering_name(job) else {
            warn!(
                component = "stage",
                job_id, "deliver stage could not resolve offering name"
            );
            return Ok(());
        };
        let (_config, handlers) = match self.registry.load_offering(&offering_name) {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!(
                    component = "stage",
                    job_id,
                    offering = %offering_name,
                    error = %err,
                    "deliver stage could not load offering"
                );
                return Ok(());
            }
        };

        let requirements = resolve_service_requirements(job);
        let ctx = self.build_context(job_id, &offering_name, job).await?;

        // The one place arbitrary offering code runs. Never retried:
        // handlers may have external side effects.
        let result = handlers
            .execute_job(&requirements, &ctx)
            .await
            .map_err(|err| SellerError::HandlerFailed {
                offering: offering_name.clone(),
                reason: err.to_string(),
            })?;

        let request = DeliverRequest {
            deliverable: result.deliverable,
            payable_detail: result.payable_detail,
        };
        with_retry("deliver", &self.retry, || {
            self.api.deliver_job(job_id, &request)
        })
        .await?;

        self.ledger.mark_delivered(job_id);
        info!(
            component = "stage",
            job_id,
            offering = %offering_name,
            "deliver stage complete"
        );
        Ok(())
    }
}
