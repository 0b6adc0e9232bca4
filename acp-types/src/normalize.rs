//! Payload normalization helpers.
//!
//! The backend surfaces the same logical information under several payload
//! variants depending on its version and which channel delivered the
//! event. Everything in this module is a total function: invalid input
//! yields "absent", never an error.

use crate::{Job, Phase};
use serde_json::{Map, Value};

/// Keys that carry routing metadata rather than buyer requirements. When
/// falling back to a whole negotiation-memo document, these are stripped.
pub const RESERVED_REQUIREMENT_KEYS: [&str; 11] = [
    "name",
    "offeringName",
    "offering",
    "requirement",
    "requirements",
    "serviceRequirements",
    "price",
    "priceValue",
    "priceType",
    "jobFee",
    "memoToSign",
];

const OFFERING_NAME_KEYS: [&str; 4] = ["jobOfferingName", "offeringName", "offering", "name"];
const REQUIREMENT_KEYS: [&str; 3] = ["requirement", "requirements", "serviceRequirements"];

/// Canonical label for a raw phase value, `"UNKNOWN"` when unrecognized.
pub fn phase_label(v: &Value) -> String {
    match Phase::from_value(v) {
        Some(p) => p.label().to_string(),
        None => "UNKNOWN".to_string(),
    }
}

/// Lowercase and trim an address; empty becomes absent.
pub fn normalize_address(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Decode a job id from a raw value: integers and digit-only strings.
pub fn job_id_from_value(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
                trimmed.parse().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

fn non_empty_string(v: &Value) -> Option<String> {
    let s = v.as_str()?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn first_named(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| map.get(*k).and_then(non_empty_string))
}

fn negotiation_memo_object(job: &Job) -> Option<Map<String, Value>> {
    job.find_memo_by_next_phase(Phase::Negotiation)
        .and_then(|m| m.content_as_object())
}

/// Resolve the logical offering name a job is addressed to.
///
/// Priority: the job context (`jobOfferingName` / `offeringName` /
/// `offering` / `name`), then the top-level job name, then the
/// negotiation-memo JSON with the same key priority.
pub fn resolve_offering_name(job: &Job) -> Option<String> {
    if let Some(ctx) = &job.context {
        if let Some(name) = first_named(ctx, &OFFERING_NAME_KEYS) {
            return Some(name);
        }
    }
    if let Some(name) = &job.name {
        let trimmed = name.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    negotiation_memo_object(job).and_then(|doc| first_named(&doc, &OFFERING_NAME_KEYS))
}

fn requirements_from(map: &Map<String, Value>) -> Option<Map<String, Value>> {
    REQUIREMENT_KEYS
        .iter()
        .find_map(|k| map.get(*k).and_then(Value::as_object).cloned())
}

/// Resolve the buyer's stated service requirements.
///
/// Priority: the job context's `requirement` / `requirements` /
/// `serviceRequirements` map, then the negotiation-memo JSON's same keys,
/// then the whole negotiation-memo document minus
/// [`RESERVED_REQUIREMENT_KEYS`]. Empty map when nothing resolves.
pub fn resolve_service_requirements(job: &Job) -> Map<String, Value> {
    if let Some(ctx) = &job.context {
        if let Some(req) = requirements_from(ctx) {
            return req;
        }
    }
    if let Some(doc) = negotiation_memo_object(job) {
        if let Some(req) = requirements_from(&doc) {
            return req;
        }
        let stripped: Map<String, Value> = doc
            .into_iter()
            .filter(|(k, _)| !RESERVED_REQUIREMENT_KEYS.contains(&k.as_str()))
            .collect();
        if !stripped.is_empty() {
            return stripped;
        }
    }
    Map::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Memo;
    use serde_json::json;

    fn job_with_context(context: Value) -> Job {
        Job {
            context: context.as_object().cloned(),
            ..Job::default()
        }
    }

    fn negotiation_memo(content: Value) -> Memo {
        Memo {
            id: Some(1),
            next_phase: Some(Phase::Negotiation),
            content: content.to_string(),
            ..Memo::default()
        }
    }

    #[test]
    fn phase_label_round_trips_every_wire_value() {
        for n in 0..7u64 {
            let from_int = Phase::from_value(&json!(n));
            let from_label = Phase::from_value(&json!(phase_label(&json!(n))));
            assert_eq!(from_int, from_label);
            assert!(from_int.is_some());
        }
        assert_eq!(phase_label(&json!("garbage")), "UNKNOWN");
    }

    #[test]
    fn addresses_are_lowercased_and_trimmed() {
        assert_eq!(normalize_address("  0xAbCd  "), Some("0xabcd".to_string()));
        assert_eq!(normalize_address("   "), None);
        assert_eq!(normalize_address(""), None);
    }

    #[test]
    fn job_ids_accept_integers_and_digit_strings() {
        assert_eq!(job_id_from_value(&json!(42)), Some(42));
        assert_eq!(job_id_from_value(&json!("42")), Some(42));
        assert_eq!(job_id_from_value(&json!(" 42 ")), Some(42));
        assert_eq!(job_id_from_value(&json!("42x")), None);
        assert_eq!(job_id_from_value(&json!(-1)), None);
        assert_eq!(job_id_from_value(&json!(1.5)), None);
        assert_eq!(job_id_from_value(&json!({})), None);
    }

    #[test]
    fn offering_name_prefers_context_over_memo() {
        let mut job = job_with_context(json!({"offeringName": "from_context"}));
        job.memos
            .push(negotiation_memo(json!({"name": "from_memo"})));
        assert_eq!(resolve_offering_name(&job), Some("from_context".into()));
    }

    #[test]
    fn offering_name_falls_back_to_job_name_then_memo() {
        let mut job = Job {
            name: Some("  top_level  ".into()),
            ..Job::default()
        };
        assert_eq!(resolve_offering_name(&job), Some("top_level".into()));

        job.name = None;
        job.memos
            .push(negotiation_memo(json!({"offering": "from_memo"})));
        assert_eq!(resolve_offering_name(&job), Some("from_memo".into()));
    }

    #[test]
    fn offering_name_ignores_blank_candidates() {
        let job = job_with_context(json!({"offeringName": "   ", "name": "real"}));
        assert_eq!(resolve_offering_name(&job), Some("real".into()));
    }

    #[test]
    fn offering_name_absent_when_nothing_resolves() {
        let mut job = Job::default();
        job.memos.push(negotiation_memo(json!({"price": 3})));
        assert_eq!(resolve_offering_name(&job), None);
    }

    #[test]
    fn requirements_prefer_context_map() {
        let mut job = job_with_context(json!({"requirement": {"apiDescription": "Build /health"}}));
        job.memos
            .push(negotiation_memo(json!({"requirements": {"other": 1}})));
        let req = resolve_service_requirements(&job);
        assert_eq!(req.get("apiDescription"), Some(&json!("Build /health")));
    }

    #[test]
    fn requirements_fall_back_to_memo_keys() {
        let mut job = Job::default();
        job.memos.push(negotiation_memo(
            json!({"serviceRequirements": {"depth": "full"}}),
        ));
        let req = resolve_service_requirements(&job);
        assert_eq!(req.get("depth"), Some(&json!("full")));
    }

    #[test]
    fn requirements_last_resort_strips_reserved_keys() {
        let mut job = Job::default();
        job.memos.push(negotiation_memo(json!({
            "name": "offering_x",
            "price": 12,
            "memoToSign": "0xdead",
            "apiDescription": "Build /health",
            "tier": "pro",
        })));
        let req = resolve_service_requirements(&job);
        assert_eq!(req.get("apiDescription"), Some(&json!("Build /health")));
        assert_eq!(req.get("tier"), Some(&json!("pro")));
        assert!(req.get("name").is_none());
        assert!(req.get("price").is_none());
        assert!(req.get("memoToSign").is_none());
    }

    #[test]
    fn requirements_empty_when_nothing_resolves() {
        let job = Job::default();
        assert!(resolve_service_requirements(&job).is_empty());

        // A memo whose content is not JSON resolves to nothing.
        let mut job = Job::default();
        job.memos.push(Memo {
            next_phase: Some(Phase::Negotiation),
            content: "please build me an api".into(),
            ..Memo::default()
        });
        assert!(resolve_service_requirements(&job).is_empty());
    }

    #[test]
    fn requirements_is_pure_over_context_and_memos() {
        let mut job = job_with_context(json!({"requirements": {"a": 1}}));
        job.memos.push(negotiation_memo(json!({"b": 2})));
        let first = resolve_service_requirements(&job);
        let second = resolve_service_requirements(&job);
        assert_eq!(first, second);
    }
}
