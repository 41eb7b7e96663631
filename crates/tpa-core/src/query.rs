use crate::errors::QueryError;
use crate::model::{AssessmentRun, RunStatus, RunSummary, Stage};
use crate::storage::Store;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Most runs a listing returns.
pub const LIST_LIMIT: u32 = 50;

/// Where engines put map overlays inside the payload, highest priority first.
pub const OVERLAY_PROBES: &[&str] = &[
    "/artifacts/geojson",
    "/artifacts/overlays/geojson",
    "/artifacts/map/geojson",
];

/// A stored run split into the sections the UI renders separately.
/// Sections missing from the payload serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDetail {
    pub id: i64,
    pub case_id: Option<String>,
    pub stage: Stage,
    pub status: RunStatus,
    pub model_ref: Option<String>,
    pub latency_ms: Option<i64>,
    pub created_at: String,
    pub recommendation: Option<Value>,
    pub policies: Option<Value>,
    pub spatial: Option<Value>,
    pub checklist: Option<Value>,
    pub draft_report_md: Option<Value>,
    pub artifacts: Option<Value>,
    pub trace: Option<Value>,
}

impl From<AssessmentRun> for RunDetail {
    fn from(run: AssessmentRun) -> Self {
        let section = |name: &str| run.payload.get(name).filter(|v| !v.is_null()).cloned();
        Self {
            recommendation: section("recommendation"),
            policies: section("policies"),
            spatial: section("spatial"),
            checklist: section("checklist"),
            draft_report_md: section("draft_report_md"),
            artifacts: section("artifacts"),
            trace: section("trace"),
            id: run.id,
            case_id: run.case_id,
            stage: run.stage,
            status: run.status,
            model_ref: run.model_ref,
            latency_ms: run.latency_ms,
            created_at: run.created_at,
        }
    }
}

/// Read side over the store. Pure reads, safe to share.
#[derive(Clone)]
pub struct QueryService {
    store: Store,
}

impl QueryService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn list(&self, case_id: Option<&str>) -> Result<Vec<RunSummary>, QueryError> {
        let case_id = case_id.map(str::trim).filter(|s| !s.is_empty());
        Ok(self.store.list_recent(case_id, LIST_LIMIT)?)
    }

    pub fn get(&self, id: i64) -> Result<RunDetail, QueryError> {
        Ok(self.run(id)?.into())
    }

    pub fn overlay(&self, id: i64) -> Result<Value, QueryError> {
        let run = self.run(id)?;
        Ok(find_overlay(&run.payload)
            .cloned()
            .unwrap_or_else(empty_feature_collection))
    }

    fn run(&self, id: i64) -> Result<AssessmentRun, QueryError> {
        self.store.find_by_id(id)?.ok_or(QueryError::NotFound(id))
    }
}

/// First probe that holds a non-blank value.
pub fn find_overlay(payload: &Value) -> Option<&Value> {
    OVERLAY_PROBES
        .iter()
        .filter_map(|p| payload.pointer(p))
        .find(|v| !is_blank(v))
}

pub fn empty_feature_collection() -> Value {
    json!({"type": "FeatureCollection", "features": []})
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}
