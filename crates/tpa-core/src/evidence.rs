use crate::model::EvidenceRecord;
use serde_json::Value;

/// Flattens `payload.policies[].evidence[]` into records, policy order then
/// evidence order. Missing or non-array levels contribute nothing.
pub fn extract(payload: &Value) -> Vec<EvidenceRecord> {
    let mut out = Vec::new();
    for policy in array_at(payload.get("policies")) {
        let label = policy_label(policy);
        for ev in array_at(policy.get("evidence")) {
            out.push(EvidenceRecord {
                kind: text(ev.get("kind")),
                label: label.clone(),
                source_uri: text(ev.get("uri")),
                source_pointer: text(ev.get("pointer")),
                snippet: text(ev.get("snippet")),
                // filled by a later scoring stage
                score: None,
                rationale: None,
            });
        }
    }
    out
}

/// `policy_id` when present, otherwise `title`.
fn policy_label(policy: &Value) -> Option<String> {
    match policy.get("policy_id") {
        Some(v) if !v.is_null() => text(Some(v)),
        _ => text(policy.get("title")),
    }
}

fn array_at(v: Option<&Value>) -> &[Value] {
    v.and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

fn text(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
