//! Offerings: locally implemented services matched to inbound jobs by
//! logical name.
//!
//! Each offering pairs an `offering.json` config (under the offerings
//! root) with an implementation of the [`OfferingHandlers`] trait,
//! registered at startup. The registry resolves buyer-supplied names to
//! both halves.

pub mod registry;

pub use registry::OfferingRegistry;

use crate::errors::SellerResult;
use acp_types::{AdditionalFunds, ExecuteJobResult, Job};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Per-invocation context passed to handler capabilities. Built fresh for
/// every stage invocation, never cached.
#[derive(Debug)]
pub struct JobContext<'a> {
    pub job_id: u64,
    pub offering_name: String,
    pub delivery_root: PathBuf,
    /// Per-job artifact directory, already created.
    pub job_dir: PathBuf,
    pub job: &'a Job,
}

/// Outcome of requirement validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid { reason: Option<String> },
}

impl Validation {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Validation::Invalid {
            reason: Some(reason.into()),
        }
    }
}

/// The capabilities an offering exposes to the job runtime.
///
/// `execute_job` is required; the rest have default no-op implementations
/// matching offerings that do not customize validation or payment text.
#[async_trait]
pub trait OfferingHandlers: Send + Sync {
    /// Produce the deliverable for a funded job. This is the only place
    /// arbitrary offering code runs; it may suspend for as long as the
    /// work takes. Side effects here are not retried.
    async fn execute_job(
        &self,
        requirements: &Map<String, Value>,
        ctx: &JobContext<'_>,
    ) -> SellerResult<ExecuteJobResult>;

    /// Inspect requirements before the job is accepted.
    async fn validate_requirements(
        &self,
        _requirements: &Map<String, Value>,
        _ctx: &JobContext<'_>,
    ) -> SellerResult<Validation> {
        Ok(Validation::Valid)
    }

    /// Custom text for the payment request, when the offering wants more
    /// than the stock phrasing.
    async fn request_payment(
        &self,
        _requirements: &Map<String, Value>,
        _ctx: &JobContext<'_>,
    ) -> SellerResult<Option<String>> {
        Ok(None)
    }

    /// Additional funds to request alongside payment. Consulted only when
    /// the offering config sets `requiredFunds`.
    async fn request_additional_funds(
        &self,
        _requirements: &Map<String, Value>,
        _ctx: &JobContext<'_>,
    ) -> SellerResult<Option<AdditionalFunds>> {
        Ok(None)
    }
}
