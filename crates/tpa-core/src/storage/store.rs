use crate::model::{AssessmentRun, EvidenceRecord, NewRun, RunStatus, RunSummary, Stage, StoredEvidence};
use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Run and evidence persistence. Append-only: nothing here updates a run.
#[derive(Clone)]
pub struct Store {
    pub conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create db dir {}", parent.display()))?;
        }
        let conn = Connection::open(path).context("failed to open sqlite db")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite db")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("sqlite connection lock poisoned"))
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(crate::storage::schema::DDL)?;
        migrate_v02(&conn)?;
        Ok(())
    }

    pub fn save(&self, run: &NewRun) -> anyhow::Result<i64> {
        let conn = self.lock()?;
        insert_run(&conn, run, &now_rfc3339())
    }

    pub fn save_evidence(&self, run_id: i64, records: &[EvidenceRecord]) -> anyhow::Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let n = insert_evidence(&tx, run_id, records, &now_rfc3339())?;
        tx.commit()?;
        Ok(n)
    }

    /// The run and its evidence land together or not at all.
    pub fn record_run(&self, run: &NewRun, evidence: &[EvidenceRecord]) -> anyhow::Result<i64> {
        let mut conn = self.lock()?;
        let created_at = now_rfc3339();
        let tx = conn.transaction()?;
        let run_id = insert_run(&tx, run, &created_at)?;
        insert_evidence(&tx, run_id, evidence, &created_at)?;
        tx.commit()?;
        Ok(run_id)
    }

    pub fn find_by_id(&self, id: i64) -> anyhow::Result<Option<AssessmentRun>> {
        let conn = self.lock()?;
        let run = conn
            .query_row(
                "SELECT id, case_id, stage, status, payload_json, model_ref, latency_ms, created_at
                 FROM assessment_runs WHERE id = ?1",
                params![id],
                |row| {
                    let payload_str: Option<String> = row.get(4)?;
                    Ok(AssessmentRun {
                        id: row.get(0)?,
                        case_id: row.get(1)?,
                        stage: stage_from_column(&row.get::<_, String>(2)?),
                        status: RunStatus::parse(&row.get::<_, String>(3)?),
                        payload: payload_from_column(payload_str.as_deref()),
                        model_ref: row.get(5)?,
                        latency_ms: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(run)
    }

    /// Newest first. `case_id` is an equality filter when given.
    pub fn list_recent(&self, case_id: Option<&str>, limit: u32) -> anyhow::Result<Vec<RunSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, case_id, stage, status, model_ref, latency_ms, created_at
             FROM assessment_runs
             WHERE ?1 IS NULL OR case_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![case_id, limit], |row| {
            Ok(RunSummary {
                id: row.get(0)?,
                case_id: row.get(1)?,
                stage: stage_from_column(&row.get::<_, String>(2)?),
                status: RunStatus::parse(&row.get::<_, String>(3)?),
                model_ref: row.get(4)?,
                latency_ms: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn evidence_for_run(&self, run_id: i64) -> anyhow::Result<Vec<StoredEvidence>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, run_id, kind, label, source_uri, source_pointer, snippet, score, rationale, created_at
             FROM evidence_records
             WHERE run_id = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok(StoredEvidence {
                    id: row.get(0)?,
                    run_id: row.get(1)?,
                    record: EvidenceRecord {
                        kind: row.get(2)?,
                        label: row.get(3)?,
                        source_uri: row.get(4)?,
                        source_pointer: row.get(5)?,
                        snippet: row.get(6)?,
                        score: row.get(7)?,
                        rationale: row.get(8)?,
                    },
                    created_at: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_evidence(&self, run_id: i64) -> anyhow::Result<i64> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM evidence_records WHERE run_id = ?1",
            params![run_id],
            |r| r.get(0),
        )?;
        Ok(n)
    }

    pub fn count_runs(&self) -> anyhow::Result<i64> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM assessment_runs", [], |r| r.get(0))?;
        Ok(n)
    }
}

fn insert_run(conn: &Connection, run: &NewRun, created_at: &str) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO assessment_runs(case_id, stage, status, payload_json, model_ref, latency_ms, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            run.case_id,
            run.stage.as_str(),
            run.status.as_str(),
            serde_json::to_string(&run.payload)?,
            run.model_ref,
            run.latency_ms,
            created_at
        ],
    )
    .context("insert run")?;
    Ok(conn.last_insert_rowid())
}

fn insert_evidence(
    conn: &Connection,
    run_id: i64,
    records: &[EvidenceRecord],
    created_at: &str,
) -> anyhow::Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO evidence_records(run_id, kind, label, source_uri, source_pointer, snippet, score, rationale, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    for rec in records {
        stmt.execute(params![
            run_id,
            rec.kind,
            rec.label,
            rec.source_uri,
            rec.source_pointer,
            rec.snippet,
            rec.score,
            rec.rationale,
            created_at
        ])
        .context("insert evidence")?;
    }
    Ok(records.len())
}

// Millisecond precision, UTC, fixed width: sorts lexically in time order.
fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn stage_from_column(s: &str) -> Stage {
    match s {
        "validate" => Stage::Validate,
        "notice" => Stage::Notice,
        _ => Stage::Assess,
    }
}

fn payload_from_column(s: Option<&str>) -> serde_json::Value {
    s.filter(|s| !s.trim().is_empty())
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_else(|| serde_json::json!({}))
}

// Scoring columns arrived after the first evidence table shipped.
fn migrate_v02(conn: &Connection) -> anyhow::Result<()> {
    let cols = get_columns(conn, "evidence_records")?;
    add_column_if_missing(conn, &cols, "evidence_records", "score", "REAL")?;
    add_column_if_missing(conn, &cols, "evidence_records", "rationale", "TEXT")?;
    Ok(())
}

fn get_columns(conn: &Connection, table: &str) -> anyhow::Result<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut out = HashSet::new();
    for r in rows {
        out.insert(r?);
    }
    Ok(out)
}

fn add_column_if_missing(
    conn: &Connection,
    cols: &HashSet<String>,
    table: &str,
    col: &str,
    ty: &str,
) -> anyhow::Result<()> {
    if !cols.contains(col) {
        let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, col, ty);
        conn.execute(&sql, [])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> Store {
        let s = Store::memory().unwrap();
        s.init_schema().unwrap();
        s
    }

    fn run(case_id: Option<&str>) -> NewRun {
        NewRun {
            case_id: case_id.map(str::to_string),
            stage: Stage::Assess,
            status: RunStatus::Ok,
            payload: json!({"recommendation": {"outcome": "approve"}}),
            model_ref: Some("m".into()),
            latency_ms: Some(10),
        }
    }

    #[test]
    fn init_schema_is_idempotent() {
        let s = store();
        s.init_schema().unwrap();
        let conn = s.conn.lock().unwrap();
        let cols = get_columns(&conn, "evidence_records").unwrap();
        assert!(cols.contains("score") && cols.contains("rationale"));
    }

    #[test]
    fn list_orders_by_created_at_not_id() {
        let s = store();
        {
            let conn = s.conn.lock().unwrap();
            insert_run(&conn, &run(Some("1")), "2026-01-02T00:00:00.000Z").unwrap();
            insert_run(&conn, &run(Some("1")), "2026-01-01T00:00:00.000Z").unwrap();
            insert_run(&conn, &run(Some("2")), "2026-01-03T00:00:00.000Z").unwrap();
        }
        let all = s.list_recent(None, 50).unwrap();
        assert_eq!(all.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3, 1, 2]);

        let only_1 = s.list_recent(Some("1"), 50).unwrap();
        assert_eq!(only_1.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);

        assert_eq!(s.list_recent(None, 1).unwrap().len(), 1);
    }

    #[test]
    fn null_case_runs_only_show_unfiltered() {
        let s = store();
        s.save(&run(None)).unwrap();
        assert_eq!(s.list_recent(None, 50).unwrap().len(), 1);
        assert!(s.list_recent(Some("42"), 50).unwrap().is_empty());
    }

    #[test]
    fn record_run_writes_evidence_with_run() {
        let s = store();
        let evidence = vec![
            EvidenceRecord {
                kind: Some("doc".into()),
                label: Some("H1".into()),
                ..Default::default()
            },
            EvidenceRecord::default(),
        ];
        let id = s.record_run(&run(Some("42")), &evidence).unwrap();
        assert_eq!(s.count_evidence(id).unwrap(), 2);

        let stored = s.evidence_for_run(id).unwrap();
        assert_eq!(stored[0].record.label.as_deref(), Some("H1"));
        assert_eq!(stored[0].run_id, id);

        let back = s.find_by_id(id).unwrap().unwrap();
        assert_eq!(back.payload["recommendation"]["outcome"], "approve");
        assert_eq!(back.case_id.as_deref(), Some("42"));
        assert!(s.find_by_id(id + 1).unwrap().is_none());
    }

    #[test]
    fn evidence_for_unknown_run_violates_foreign_key() {
        let s = store();
        assert!(s.save_evidence(99, &[EvidenceRecord::default()]).is_err());
        assert_eq!(s.save_evidence(99, &[]).unwrap(), 0);
    }
}
