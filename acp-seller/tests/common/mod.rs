//! Shared fixtures for the runtime integration tests.
#![allow(dead_code)]

use acp_client::{AcpError, AcpResult, RetryOptions, SellerApi};
use acp_seller::offering::{JobContext, OfferingHandlers, OfferingRegistry, Validation};
use acp_seller::runtime::{Dispatcher, StageExecutor, StageLedger};
use acp_types::{
    AcceptRequest, AdditionalFunds, DeliverRequest, Deliverable, ExecuteJobResult,
    PaymentRequirement,
};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

pub const WALLET: &str = "0xAAA111bbb222ccc333ddd444eee555fff666aaa7";

/// Records every seller call; optionally fails the first N accept calls
/// with a retryable 429.
#[derive(Default)]
pub struct MockSellerApi {
    pub accepts: Mutex<Vec<(u64, AcceptRequest, Instant)>>,
    pub payments: Mutex<Vec<(u64, PaymentRequirement)>>,
    pub delivers: Mutex<Vec<(u64, DeliverRequest)>>,
    pub accept_failures: AtomicU32,
    /// Payloads served on page 1 of `active_jobs`.
    pub active: Mutex<Vec<Value>>,
}

impl MockSellerApi {
    pub fn accept_calls(&self) -> Vec<(u64, AcceptRequest, Instant)> {
        self.accepts.lock().unwrap().clone()
    }

    pub fn payment_calls(&self) -> Vec<(u64, PaymentRequirement)> {
        self.payments.lock().unwrap().clone()
    }

    pub fn deliver_calls(&self) -> Vec<(u64, DeliverRequest)> {
        self.delivers.lock().unwrap().clone()
    }

    pub fn deliver_count(&self) -> usize {
        self.delivers.lock().unwrap().len()
    }
}

#[async_trait]
impl SellerApi for MockSellerApi {
    async fn accept_or_reject_job(&self, job_id: u64, req: &AcceptRequest) -> AcpResult<()> {
        self.accepts
            .lock()
            .unwrap()
            .push((job_id, req.clone(), Instant::now()));
        if self.accept_failures.load(Ordering::SeqCst) > 0 {
            self.accept_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(AcpError::Status {
                status: 429,
                body: "{\"statusCode\":429,\"message\":\"rate limited\"}".to_string(),
            });
        }
        Ok(())
    }

    async fn request_payment(&self, job_id: u64, req: &PaymentRequirement) -> AcpResult<()> {
        self.payments.lock().unwrap().push((job_id, req.clone()));
        Ok(())
    }

    async fn deliver_job(&self, job_id: u64, req: &DeliverRequest) -> AcpResult<()> {
        self.delivers.lock().unwrap().push((job_id, req.clone()));
        Ok(())
    }

    async fn active_jobs(&self, page: u32, _page_size: u32) -> AcpResult<Vec<Value>> {
        if page == 1 {
            Ok(self.active.lock().unwrap().clone())
        } else {
            Ok(Vec::new())
        }
    }
}

pub struct EchoHandlers {
    pub executed: Arc<AtomicU32>,
}

#[async_trait]
impl OfferingHandlers for EchoHandlers {
    async fn execute_job(
        &self,
        _requirements: &Map<String, Value>,
        _ctx: &JobContext<'_>,
    ) -> acp_seller::SellerResult<ExecuteJobResult> {
        self.executed.fetch_add(1, Ordering::SeqCst);
        Ok(ExecuteJobResult {
            deliverable: Deliverable::text("report written"),
            payable_detail: None,
        })
    }
}

pub struct StrictHandlers;

#[async_trait]
impl OfferingHandlers for StrictHandlers {
    async fn execute_job(
        &self,
        _requirements: &Map<String, Value>,
        _ctx: &JobContext<'_>,
    ) -> acp_seller::SellerResult<ExecuteJobResult> {
        Ok(ExecuteJobResult {
            deliverable: Deliverable::text("unreachable"),
            payable_detail: None,
        })
    }

    async fn validate_requirements(
        &self,
        requirements: &Map<String, Value>,
        _ctx: &JobContext<'_>,
    ) -> acp_seller::SellerResult<Validation> {
        if requirements.contains_key("apiDescription") {
            Ok(Validation::Valid)
        } else {
            Ok(Validation::invalid("apiDescription is required"))
        }
    }
}

pub struct FundedHandlers;

#[async_trait]
impl OfferingHandlers for FundedHandlers {
    async fn execute_job(
        &self,
        _requirements: &Map<String, Value>,
        _ctx: &JobContext<'_>,
    ) -> acp_seller::SellerResult<ExecuteJobResult> {
        Ok(ExecuteJobResult {
            deliverable: Deliverable::text("research delivered"),
            payable_detail: None,
        })
    }

    async fn request_additional_funds(
        &self,
        _requirements: &Map<String, Value>,
        _ctx: &JobContext<'_>,
    ) -> acp_seller::SellerResult<Option<AdditionalFunds>> {
        Ok(Some(AdditionalFunds {
            amount: 2.0,
            token_address: "0xToken".to_string(),
            recipient: "0xRecipient".to_string(),
            content: Some("Send funds then we start".to_string()),
        }))
    }
}

pub struct Harness {
    pub offerings: TempDir,
    pub delivery: TempDir,
    pub api: Arc<MockSellerApi>,
    pub dispatcher: Arc<Dispatcher>,
    pub ledger: Arc<StageLedger>,
    pub executed: Arc<AtomicU32>,
}

pub fn write_offering(root: &std::path::Path, dir: &str, config: Value) {
    let path = root.join(dir);
    std::fs::create_dir_all(&path).unwrap();
    std::fs::write(
        path.join("offering.json"),
        serde_json::to_string_pretty(&config).unwrap(),
    )
    .unwrap();
}

pub fn fast_retry() -> RetryOptions {
    RetryOptions {
        attempts: 5,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        on_retry: None,
    }
}

pub fn harness_with_retry(retry: RetryOptions) -> Harness {
    let offerings = TempDir::new().unwrap();
    let delivery = TempDir::new().unwrap();
    let executed = Arc::new(AtomicU32::new(0));

    write_offering(
        offerings.path(),
        "typescript_api_development",
        json!({"name": "typescript_api_development"}),
    );
    write_offering(offerings.path(), "strict_api", json!({"name": "strict_api"}));
    write_offering(
        offerings.path(),
        "funded_research",
        json!({"name": "funded_research", "requiredFunds": true}),
    );

    let mut registry = OfferingRegistry::new(offerings.path());
    registry.register(
        "typescript_api_development",
        Arc::new(EchoHandlers {
            executed: executed.clone(),
        }),
    );
    registry.register("strict_api", Arc::new(StrictHandlers));
    registry.register("funded_research", Arc::new(FundedHandlers));

    let api = Arc::new(MockSellerApi::default());
    let ledger = Arc::new(StageLedger::new());
    let stages = StageExecutor::new(
        api.clone(),
        Arc::new(registry),
        ledger.clone(),
        delivery.path().to_path_buf(),
        retry,
    );
    let dispatcher = Arc::new(Dispatcher::new(WALLET, ledger.clone(), stages));

    Harness {
        offerings,
        delivery,
        api,
        dispatcher,
        ledger,
        executed,
    }
}

pub fn harness() -> Harness {
    harness_with_retry(fast_retry())
}

pub fn negotiation_job(id: u64) -> Value {
    json!({
        "id": id,
        "phase": "NEGOTIATION",
        "providerAddress": WALLET,
        "memos": [{
            "id": 999,
            "nextPhase": "NEGOTIATION",
            "content": "{\"name\":\"typescript_api_development\",\"requirement\":{\"apiDescription\":\"Build /health\"}}",
        }],
    })
}

pub fn transaction_job(id: u64) -> Value {
    json!({
        "id": id,
        "phase": "TRANSACTION",
        "providerAddress": WALLET,
        "deliverable": null,
        "memos": [
            {
                "id": 998,
                "nextPhase": "NEGOTIATION",
                "content": "{\"name\":\"typescript_api_development\"}",
            },
            {"id": 999, "nextPhase": "TRANSACTION", "content": "payment requested"},
        ],
    })
}
