//! Typed seller operations against the ACP backend.
//!
//! [`SellerApi`] is the seam the job runtime programs against; tests use
//! recording implementations, production uses [`HttpSellerApi`]. Each call
//! emits a single structured log line. Requirement payloads and memo
//! content never appear in log fields.

use crate::client::BackendClient;
use crate::constants::ACTIVE_JOBS_PATH;
use crate::error::AcpResult;
use acp_types::{AcceptRequest, DeliverRequest, PaymentRequirement};
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

/// The three seller side-effect operations plus the active-jobs listing
/// the poll reconciler consumes.
#[async_trait]
pub trait SellerApi: Send + Sync {
    async fn accept_or_reject_job(&self, job_id: u64, req: &AcceptRequest) -> AcpResult<()>;

    async fn request_payment(&self, job_id: u64, req: &PaymentRequirement) -> AcpResult<()>;

    async fn deliver_job(&self, job_id: u64, req: &DeliverRequest) -> AcpResult<()>;

    /// One page of jobs currently active for the authenticated wallet.
    async fn active_jobs(&self, page: u32, page_size: u32) -> AcpResult<Vec<Value>>;
}

/// Production [`SellerApi`] over a [`BackendClient`].
#[derive(Clone)]
pub struct HttpSellerApi {
    client: BackendClient,
}

impl HttpSellerApi {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SellerApi for HttpSellerApi {
    async fn accept_or_reject_job(&self, job_id: u64, req: &AcceptRequest) -> AcpResult<()> {
        let path = format!("/acp/providers/jobs/{job_id}/accept");
        self.client.post_json(&path, req).await?;
        info!(
            component = "seller-api",
            job_id,
            accept = req.accept,
            "accept decision sent"
        );
        Ok(())
    }

    async fn request_payment(&self, job_id: u64, req: &PaymentRequirement) -> AcpResult<()> {
        let path = format!("/acp/providers/jobs/{job_id}/requirement");
        self.client.post_json(&path, req).await?;
        info!(
            component = "seller-api",
            job_id,
            has_payable = req.payable_detail.is_some(),
            "payment requested"
        );
        Ok(())
    }

    async fn deliver_job(&self, job_id: u64, req: &DeliverRequest) -> AcpResult<()> {
        let path = format!("/acp/providers/jobs/{job_id}/deliverable");
        self.client.post_json(&path, req).await?;
        info!(component = "seller-api", job_id, "deliverable sent");
        Ok(())
    }

    async fn active_jobs(&self, page: u32, page_size: u32) -> AcpResult<Vec<Value>> {
        let path = format!("{ACTIVE_JOBS_PATH}?page={page}&pageSize={page_size}");
        let body = self.client.get_json(&path).await?;
        Ok(extract_job_list(body))
    }
}

/// The active-jobs endpoint has answered both `{"data": [...]}` and a bare
/// array across backend versions.
fn extract_job_list(body: Value) -> Vec<Value> {
    match body {
        Value::Array(jobs) => jobs,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(jobs)) => jobs,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_list_accepts_both_envelope_shapes() {
        assert_eq!(
            extract_job_list(json!([{"id": 1}, {"id": 2}])).len(),
            2
        );
        assert_eq!(
            extract_job_list(json!({"data": [{"id": 1}]})).len(),
            1
        );
        assert!(extract_job_list(json!({"data": null})).is_empty());
        assert!(extract_job_list(json!("weird")).is_empty());
    }
}
