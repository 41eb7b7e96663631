use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which endpoint of the assessment engine a run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Assess,
    Validate,
    Notice,
}

impl Stage {
    /// Lenient parse: anything that is not `validate` or `notice` is an assessment.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "validate" => Stage::Validate,
            "notice" => Stage::Notice,
            "assess" | "" => Stage::Assess,
            other => {
                tracing::warn!(event = "stage_defaulted", requested = %other, stage = "assess");
                Stage::Assess
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Assess => "assess",
            Stage::Validate => "validate",
            Stage::Notice => "notice",
        }
    }

    /// Path segment appended to the engine base URL.
    pub fn endpoint_path(&self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    Error,
}

impl RunStatus {
    /// Status is a function of the transport outcome only.
    pub fn from_http_status(code: u16) -> Self {
        if code == 200 {
            RunStatus::Ok
        } else {
            RunStatus::Error
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "ok" => RunStatus::Ok,
            _ => RunStatus::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Ok => "ok",
            RunStatus::Error => "error",
        }
    }
}

/// A run as it is handed to the store, before an id is assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRun {
    pub case_id: Option<String>,
    pub stage: Stage,
    pub status: RunStatus,
    pub payload: Value,
    pub model_ref: Option<String>,
    pub latency_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRun {
    pub id: i64,
    pub case_id: Option<String>,
    pub stage: Stage,
    pub status: RunStatus,
    pub payload: Value,
    pub model_ref: Option<String>,
    pub latency_ms: Option<i64>,
    pub created_at: String,
}

impl AssessmentRun {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            id: self.id,
            case_id: self.case_id.clone(),
            stage: self.stage,
            status: self.status,
            model_ref: self.model_ref.clone(),
            latency_ms: self.latency_ms,
            created_at: self.created_at.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: i64,
    pub case_id: Option<String>,
    pub stage: Stage,
    pub status: RunStatus,
    pub model_ref: Option<String>,
    pub latency_ms: Option<i64>,
    pub created_at: String,
}

/// One evidence entry flattened out of `payload.policies[].evidence[]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub kind: Option<String>,
    pub label: Option<String>,
    pub source_uri: Option<String>,
    pub source_pointer: Option<String>,
    pub snippet: Option<String>,
    pub score: Option<f64>,
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvidence {
    pub id: i64,
    pub run_id: i64,
    #[serde(flatten)]
    pub record: EvidenceRecord,
    pub created_at: String,
}

/// What `create` hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedRun {
    pub id: i64,
    pub result: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_parse_is_lenient() {
        assert_eq!(Stage::parse("validate"), Stage::Validate);
        assert_eq!(Stage::parse("NOTICE"), Stage::Notice);
        assert_eq!(Stage::parse(""), Stage::Assess);
        assert_eq!(Stage::parse("decide"), Stage::Assess);
        assert_eq!(Stage::Notice.endpoint_path(), "notice");
    }

    #[test]
    fn status_depends_only_on_http_code() {
        assert_eq!(RunStatus::from_http_status(200), RunStatus::Ok);
        assert_eq!(RunStatus::from_http_status(201), RunStatus::Error);
        assert_eq!(RunStatus::from_http_status(0), RunStatus::Error);
        assert_eq!(RunStatus::from_http_status(500), RunStatus::Error);
    }

    #[test]
    fn stage_serializes_snake_case() {
        let v = serde_json::to_value(Stage::Validate).unwrap();
        assert_eq!(v, serde_json::json!("validate"));
    }
}
