//! # ACP (Agent Commerce Protocol) Seller Types
//!
//! This crate provides the Rust data structures for the seller-facing
//! surface of the Agent Commerce Protocol. The types are designed for
//! serialization and deserialization with `serde` and are deliberately
//! tolerant to schema drift from the upstream backend: lifecycle phases
//! arrive as either integers or strings, job ids as either numbers or
//! digit strings, and memo content as either raw text or embedded JSON.
//!
//! All tolerant decoding happens once, at this boundary. Code built on
//! top of these types never sees the dual wire forms.

use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod normalize;

pub use normalize::{
    job_id_from_value, normalize_address, phase_label, resolve_offering_name,
    resolve_service_requirements,
};

// ============================================================================
// Job Lifecycle Phases
// ============================================================================

/// Defines the lifecycle phases of a job.
///
/// Wire values are the integers 0..=6; symbolic names are accepted
/// case-insensitively on input. Serialization always emits the integer
/// form the backend canonically uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// A buyer has initiated the job and is describing what it wants.
    Request,
    /// Buyer and seller are agreeing on the terms of service.
    Negotiation,
    /// Payment has been requested and the job is funded or being funded.
    Transaction,
    /// The deliverable is under evaluation.
    Evaluation,
    /// Terminal: the job completed successfully.
    Completed,
    /// Terminal: the job was rejected.
    Rejected,
    /// Terminal: the job expired before completion.
    Expired,
}

impl Phase {
    /// All phases in wire order.
    pub const ALL: [Phase; 7] = [
        Phase::Request,
        Phase::Negotiation,
        Phase::Transaction,
        Phase::Evaluation,
        Phase::Completed,
        Phase::Rejected,
        Phase::Expired,
    ];

    /// The canonical integer wire value.
    pub fn as_wire(self) -> u8 {
        match self {
            Phase::Request => 0,
            Phase::Negotiation => 1,
            Phase::Transaction => 2,
            Phase::Evaluation => 3,
            Phase::Completed => 4,
            Phase::Rejected => 5,
            Phase::Expired => 6,
        }
    }

    /// The canonical upper-case symbolic name.
    pub fn label(self) -> &'static str {
        match self {
            Phase::Request => "REQUEST",
            Phase::Negotiation => "NEGOTIATION",
            Phase::Transaction => "TRANSACTION",
            Phase::Evaluation => "EVALUATION",
            Phase::Completed => "COMPLETED",
            Phase::Rejected => "REJECTED",
            Phase::Expired => "EXPIRED",
        }
    }

    /// Decode a phase from its integer wire value.
    pub fn from_wire(v: u64) -> Option<Phase> {
        Phase::ALL.get(v as usize).copied()
    }

    /// Decode a phase from a symbolic or numeric string, case-insensitively.
    pub fn from_label(s: &str) -> Option<Phase> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<u64>() {
            return Phase::from_wire(n);
        }
        let upper = trimmed.to_ascii_uppercase();
        Phase::ALL.into_iter().find(|p| p.label() == upper)
    }

    /// Tolerant decoder over a raw JSON value: accepts integers 0..=6,
    /// numeric strings, and symbolic names. Anything else is absent.
    pub fn from_value(v: &Value) -> Option<Phase> {
        match v {
            Value::Number(n) => n.as_u64().and_then(Phase::from_wire),
            Value::String(s) => Phase::from_label(s),
            _ => None,
        }
    }

    /// Whether this phase is terminal for the seller.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Rejected | Phase::Expired)
    }
}

impl Serialize for Phase {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for Phase {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(deserializer)?;
        Phase::from_value(&v)
            .ok_or_else(|| D::Error::custom(format!("unrecognized phase value: {v}")))
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// Field-level tolerant decoders. These never fail the surrounding struct:
// an unrecognized value decodes to `None` so a single drifted field cannot
// sink a whole job payload.

fn de_opt_phase<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Phase>, D::Error> {
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(v.as_ref().and_then(Phase::from_value))
}

fn de_opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(v.as_ref().and_then(job_id_from_value))
}

fn de_price<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(match v {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

fn de_content<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(match v {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        // Some backend versions inline the JSON document instead of
        // stringifying it.
        Some(other) => other.to_string(),
    })
}

// ============================================================================
// Jobs and Memos
// ============================================================================

/// A chat-like envelope attached to a job, often carrying the JSON intent
/// for the next phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Memo {
    /// Backend-assigned memo id.
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<u64>,
    /// The phase the job transitions to when this memo is signed.
    #[serde(default, deserialize_with = "de_opt_phase")]
    pub next_phase: Option<Phase>,
    /// UTF-8 content, frequently a JSON document.
    #[serde(default, deserialize_with = "de_content")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo_type: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,
}

impl Memo {
    /// Parse the memo content as a JSON object, if it is one.
    pub fn content_as_object(&self) -> Option<Map<String, Value>> {
        match serde_json::from_str::<Value>(&self.content) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    }
}

/// A single unit of work owned by the backend.
///
/// Every event source hands the core a borrowed view of one of these;
/// the core never holds a canonical copy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Backend-assigned job id, unique across the backend.
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<u64>,
    /// Current lifecycle phase. Absent when the backend sent a value this
    /// version does not recognize.
    #[serde(default, deserialize_with = "de_opt_phase")]
    pub phase: Option<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluator_address: Option<String>,
    #[serde(default, deserialize_with = "de_price")]
    pub price: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub memos: Vec<Memo>,
    /// Free-form context map supplied by the buyer at initiation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
    /// Populated once the seller has delivered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deliverable: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo_to_sign: Option<Value>,
    /// Some payload variants carry the offering name at the top level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Job {
    /// Decode a job from a raw event payload. Returns `None` when the
    /// payload is not a JSON object at all.
    pub fn from_value(raw: &Value) -> Option<Job> {
        raw.as_object()?;
        serde_json::from_value(raw.clone()).ok()
    }

    /// First memo whose `nextPhase` matches, if any.
    pub fn find_memo_by_next_phase(&self, phase: Phase) -> Option<&Memo> {
        self.memos.iter().find(|m| m.next_phase == Some(phase))
    }

    pub fn has_memo_with_next_phase(&self, phase: Phase) -> bool {
        self.find_memo_by_next_phase(phase).is_some()
    }

    /// Whether the deliverable field carries an actual deliverable
    /// (present, non-null, and not an empty string).
    pub fn has_deliverable(&self) -> bool {
        match &self.deliverable {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        }
    }
}

// ============================================================================
// Deliverables and Payments
// ============================================================================

/// A deliverable value: either plain text or a typed structured payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Deliverable {
    /// A plain text deliverable.
    Text(String),
    /// A structured deliverable with an application-defined type tag.
    Typed {
        #[serde(rename = "type")]
        kind: String,
        value: Value,
    },
}

impl Deliverable {
    pub fn text(s: impl Into<String>) -> Self {
        Deliverable::Text(s.into())
    }

    pub fn typed(kind: impl Into<String>, value: Value) -> Self {
        Deliverable::Typed {
            kind: kind.into(),
            value,
        }
    }
}

/// An optional return-transfer attached to a payment request or delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PayableDetail {
    pub amount: f64,
    pub token_address: String,
    /// Omitted on the deliver path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
}

/// Funds requested by an offering's `request_additional_funds` capability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalFunds {
    pub amount: f64,
    pub token_address: String,
    pub recipient: String,
    /// Optional override for the payment-request text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Output of an offering's `execute_job` capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteJobResult {
    pub deliverable: Deliverable,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payable_detail: Option<PayableDetail>,
}

// ============================================================================
// Offering Configuration
// ============================================================================

/// How an offering's fee is interpreted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobFeeType {
    #[default]
    Fixed,
    Percentage,
}

/// A local definition of a sellable service, parsed from the offering's
/// `offering.json`. Unknown extension fields are preserved in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferingConfig {
    /// Unique logical key used by buyers to address the offering.
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub job_fee: f64,
    #[serde(default)]
    pub job_fee_type: JobFeeType,
    /// Whether buyers must transfer additional funds before execution.
    #[serde(default)]
    pub required_funds: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Seller Request Bodies
// ============================================================================

/// Body of `POST /acp/providers/jobs/{jobId}/accept`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AcceptRequest {
    pub accept: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AcceptRequest {
    pub fn accept(reason: impl Into<String>) -> Self {
        Self {
            accept: true,
            reason: Some(reason.into()),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            accept: false,
            reason: Some(reason.into()),
        }
    }
}

/// Body of `POST /acp/providers/jobs/{jobId}/requirement`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirement {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payable_detail: Option<PayableDetail>,
}

/// Body of `POST /acp/providers/jobs/{jobId}/deliverable`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverRequest {
    pub deliverable: Deliverable,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payable_detail: Option<PayableDetail>,
}
