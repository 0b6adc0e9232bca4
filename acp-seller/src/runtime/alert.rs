//! Operational alerting for prolonged socket outages.
//!
//! Alerts go to the PagerDuty Events API. Delivery is best-effort: any
//! failure is logged and swallowed, and a missing routing key turns the
//! whole thing into a no-op. Each incident (identified by its dedup key)
//! triggers at most once until it is resolved.

use reqwest::Client;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::{info, warn};

const EVENTS_URL: &str = "https://events.pagerduty.com/v2/enqueue";

pub struct Alerter {
    routing_key: Option<String>,
    client: Client,
    /// Dedup keys with an outstanding trigger.
    open: Mutex<HashSet<String>>,
}

impl Alerter {
    pub fn new(routing_key: Option<String>) -> Self {
        Self {
            routing_key,
            client: Client::new(),
            open: Mutex::new(HashSet::new()),
        }
    }

    /// Open an incident. Deduplicated: repeated triggers for the same key
    /// are dropped until [`Alerter::resolve`] runs.
    pub async fn trigger(&self, dedup_key: &str, summary: &str) {
        let Some(routing_key) = &self.routing_key else {
            return;
        };
        {
            let mut open = self.open.lock().unwrap_or_else(|p| p.into_inner());
            if !open.insert(dedup_key.to_string()) {
                return;
            }
        }
        info!(component = "alert", dedup_key, "triggering alert");
        self.send(routing_key, "trigger", dedup_key, summary).await;
    }

    /// Close an incident. A resolve is sent only when a trigger for the
    /// same key actually went out.
    pub async fn resolve(&self, dedup_key: &str) {
        let Some(routing_key) = &self.routing_key else {
            return;
        };
        let was_open = {
            let mut open = self.open.lock().unwrap_or_else(|p| p.into_inner());
            open.remove(dedup_key)
        };
        if !was_open {
            return;
        }
        info!(component = "alert", dedup_key, "resolving alert");
        self.send(routing_key, "resolve", dedup_key, "resolved").await;
    }

    async fn send(&self, routing_key: &str, action: &str, dedup_key: &str, summary: &str) {
        let body = json!({
            "routing_key": routing_key,
            "event_action": action,
            "dedup_key": dedup_key,
            "payload": {
                "summary": summary,
                "source": "acp-seller",
                "severity": "critical",
            },
        });
        let outcome = self.client.post(EVENTS_URL).json(&body).send().await;
        match outcome {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => warn!(
                component = "alert",
                status = response.status().as_u16(),
                action,
                "alert endpoint rejected event"
            ),
            Err(err) => warn!(component = "alert", error = %err, action, "alert delivery failed"),
        }
    }
}
