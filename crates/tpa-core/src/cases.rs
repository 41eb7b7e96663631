//! Case sources: the loosely-typed planning cases an envelope is built from.
//!
//! Every capability is optional. A source that does not expose something
//! returns `None` and the envelope falls back to its documented default.

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

pub trait CaseSource {
    fn id(&self) -> Option<String> {
        None
    }
    fn application_type(&self) -> Option<String> {
        None
    }
    fn local_authority_code(&self) -> Option<String> {
        None
    }
    fn reference(&self) -> Option<String> {
        None
    }
    fn site_address(&self) -> Option<String> {
        None
    }
    /// Red-line boundary as GeoJSON.
    fn site_boundary_geometry(&self) -> Option<Value> {
        None
    }
    fn documents(&self) -> Option<Vec<CaseDocument>> {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseDocument {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default, alias = "file_url")]
    pub uri: Option<String>,
    #[serde(default, alias = "content_type")]
    pub mime: Option<String>,
}

/// A case loaded from a file or built by hand. Missing keys are absent
/// capabilities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    #[serde(default, deserialize_with = "opt_id_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub application_type: Option<String>,
    #[serde(default)]
    pub local_authority_code: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub site_address: Option<String>,
    #[serde(default)]
    pub site_boundary: Option<Value>,
    #[serde(default)]
    pub documents: Option<Vec<CaseDocument>>,
}

impl CaseSource for CaseRecord {
    fn id(&self) -> Option<String> {
        self.id.clone()
    }
    fn application_type(&self) -> Option<String> {
        self.application_type.clone()
    }
    fn local_authority_code(&self) -> Option<String> {
        self.local_authority_code.clone()
    }
    fn reference(&self) -> Option<String> {
        self.reference.clone()
    }
    fn site_address(&self) -> Option<String> {
        self.site_address.clone()
    }
    fn site_boundary_geometry(&self) -> Option<Value> {
        self.site_boundary.clone()
    }
    fn documents(&self) -> Option<Vec<CaseDocument>> {
        self.documents.clone()
    }
}

// Case ids arrive as numbers from some hosts and strings from others.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Str(String),
    Int(i64),
}

impl From<IdRepr> for String {
    fn from(v: IdRepr) -> Self {
        match v {
            IdRepr::Str(s) => s,
            IdRepr::Int(n) => n.to_string(),
        }
    }
}

fn id_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    IdRepr::deserialize(d).map(String::from)
}

/// Accepts `"42"`, `42` or null.
pub fn opt_id_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<IdRepr>::deserialize(d)?.map(String::from))
}

/// Resolves a requested case id to a source. Lookup never fails: an unknown
/// id is simply "no case".
pub trait CaseDirectory: Send + Sync {
    fn find(&self, case_id: &str) -> Option<Box<dyn CaseSource + Send>>;
}

/// Directory for deployments with no case data; every run is a local run.
pub struct NoCases;

impl CaseDirectory for NoCases {
    fn find(&self, _case_id: &str) -> Option<Box<dyn CaseSource + Send>> {
        None
    }
}

#[derive(Debug, Default, Clone)]
pub struct FileCaseDirectory {
    cases: HashMap<String, CaseRecord>,
}

impl FileCaseDirectory {
    /// Loads a YAML (or JSON) list of case records.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read cases file: {}", path.display()))?;
        let records: Vec<CaseRecord> = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse cases file: {}", path.display()))?;
        Ok(Self::from_records(records))
    }

    pub fn from_records(records: Vec<CaseRecord>) -> Self {
        let mut cases = HashMap::new();
        for record in records {
            match record.id.clone() {
                Some(id) => {
                    cases.insert(id, record);
                }
                None => tracing::warn!(event = "case_without_id_skipped"),
            }
        }
        Self { cases }
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

impl CaseDirectory for FileCaseDirectory {
    fn find(&self, case_id: &str) -> Option<Box<dyn CaseSource + Send>> {
        self.cases
            .get(case_id.trim())
            .cloned()
            .map(|c| Box::new(c) as Box<dyn CaseSource + Send>)
    }
}
