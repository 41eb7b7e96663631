use crate::model::RunStatus;
use crate::providers::engine::DispatchOutcome;
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    pub status: RunStatus,
    pub payload: Value,
    pub model_ref: Option<String>,
    pub latency_ms: Option<i64>,
}

/// Classifies the outcome and pulls the trace summary out of the body.
/// Status comes from the HTTP code alone; the body never changes it.
pub fn ingest(outcome: &DispatchOutcome) -> Ingested {
    let payload = parse_payload(&outcome.raw_body);
    Ingested {
        status: RunStatus::from_http_status(outcome.http_status),
        model_ref: trace_model_ref(&payload),
        latency_ms: trace_latency_ms(&payload),
        payload,
    }
}

/// A JSON object, or `{}` for anything else (empty, malformed, non-object).
pub fn parse_payload(raw: &[u8]) -> Value {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return json!({});
    }
    match serde_json::from_slice::<Value>(raw) {
        Ok(v @ Value::Object(_)) => v,
        Ok(other) => {
            tracing::warn!(event = "payload_not_object", kind = json_kind(&other));
            json!({})
        }
        Err(e) => {
            tracing::warn!(event = "payload_unparseable", bytes = raw.len(), error = %e);
            json!({})
        }
    }
}

pub fn trace_model_ref(payload: &Value) -> Option<String> {
    match payload.pointer("/trace/model_ref")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn trace_latency_ms(payload: &Value) -> Option<i64> {
    let v = payload.pointer("/trace/latency_ms")?;
    v.as_i64()
        .or_else(|| v.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_only_for_200() {
        for (code, expected) in [
            (200, RunStatus::Ok),
            (204, RunStatus::Error),
            (404, RunStatus::Error),
            (500, RunStatus::Error),
            (0, RunStatus::Error),
        ] {
            let got = ingest(&DispatchOutcome::new(code, "{}")).status;
            assert_eq!(got, expected, "status {code}");
        }
    }

    #[test]
    fn error_body_on_500_is_kept_but_status_is_error() {
        let body = r#"{"error":{"message":"boom"},"trace":{"model_ref":"m1"}}"#;
        let ing = ingest(&DispatchOutcome::new(500, body));
        assert_eq!(ing.status, RunStatus::Error);
        assert_eq!(ing.payload["error"]["message"], "boom");
        assert_eq!(ing.model_ref.as_deref(), Some("m1"));
    }

    #[test]
    fn empty_200_is_ok_with_empty_payload() {
        let ing = ingest(&DispatchOutcome::new(200, ""));
        assert_eq!(ing.status, RunStatus::Ok);
        assert_eq!(ing.payload, json!({}));
        assert_eq!(ing.model_ref, None);
        assert_eq!(ing.latency_ms, None);
    }

    #[test]
    fn malformed_and_non_object_bodies_become_empty() {
        assert_eq!(parse_payload(b"<html>502</html>"), json!({}));
        assert_eq!(parse_payload(b"[1,2,3]"), json!({}));
        assert_eq!(parse_payload(b"\"ok\""), json!({}));
    }

    #[test]
    fn trace_fields_are_optional_and_lenient() {
        let p = json!({"trace": {"model_ref": "gpt-x", "latency_ms": 1200}});
        assert_eq!(trace_model_ref(&p).as_deref(), Some("gpt-x"));
        assert_eq!(trace_latency_ms(&p), Some(1200));

        let p = json!({"trace": {"latency_ms": 12.9}});
        assert_eq!(trace_latency_ms(&p), Some(12));
        assert_eq!(trace_model_ref(&p), None);

        let p = json!({"trace": "not-an-object"});
        assert_eq!(trace_latency_ms(&p), None);
        assert_eq!(trace_model_ref(&json!({})), None);
    }
}
