use super::{exit_codes, load_config};
use crate::cli::args::{GlobalArgs, RunArgs};
use anyhow::Result;
use serde_json::json;
use tpa_core::{AssessmentBridge, RunStatus, Stage};

pub async fn cmd_run(args: RunArgs, global: &GlobalArgs) -> Result<i32> {
    let cfg = match load_config(global) {
        Ok(cfg) => cfg,
        Err(code) => return Ok(code),
    };
    if !cfg.enabled {
        eprintln!("assistant is disabled: set TPA_ENABLED=1 or `enabled: true` in the config");
        return Ok(exit_codes::DISABLED);
    }

    let bridge = AssessmentBridge::from_config(&cfg)?;
    let stage = Stage::parse(&args.stage);
    tracing::debug!(event = "cli_run", case_id = ?args.case_id, stage = %stage, db = %cfg.db_path.display());
    let created = bridge.create(args.case_id.as_deref(), stage).await?;
    let detail = bridge.query().get(created.id)?;

    let out = if args.payload {
        created.result
    } else {
        json!({
            "id": detail.id,
            "case_id": detail.case_id,
            "stage": detail.stage,
            "status": detail.status,
            "model_ref": detail.model_ref,
            "latency_ms": detail.latency_ms,
            "recommendation": detail.recommendation,
        })
    };
    println!("{}", serde_json::to_string_pretty(&out)?);

    if detail.status == RunStatus::Ok {
        Ok(exit_codes::OK)
    } else {
        eprintln!("run {} recorded with status error", detail.id);
        Ok(exit_codes::RUN_FAILED)
    }
}
