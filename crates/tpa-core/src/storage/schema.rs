pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS assessment_runs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  case_id TEXT,
  stage TEXT NOT NULL,
  status TEXT NOT NULL,
  payload_json TEXT NOT NULL DEFAULT '{}',
  model_ref TEXT,
  latency_ms INTEGER,
  created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_runs_case_id ON assessment_runs(case_id);
CREATE INDEX IF NOT EXISTS idx_runs_created_at ON assessment_runs(created_at);

CREATE TABLE IF NOT EXISTS evidence_records (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  run_id INTEGER NOT NULL REFERENCES assessment_runs(id),
  kind TEXT,
  label TEXT,
  source_uri TEXT,
  source_pointer TEXT,
  snippet TEXT,
  created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_evidence_run_id ON evidence_records(run_id);
"#;
