use super::{exit_codes, load_config};
use crate::cli::args::{GlobalArgs, ListArgs, ShowArgs};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde_json::Value;
use tpa_core::model::RunSummary;
use tpa_core::query::QueryService;
use tpa_core::storage::Store;
use tpa_core::{BridgeConfig, QueryError};

fn open_query(cfg: &BridgeConfig) -> Result<QueryService> {
    let store = Store::open(&cfg.db_path)
        .with_context(|| format!("failed to open run database {}", cfg.db_path.display()))?;
    store.init_schema()?;
    Ok(QueryService::new(store))
}

pub fn cmd_list(args: ListArgs, global: &GlobalArgs) -> Result<i32> {
    let cfg = match load_config(global) {
        Ok(cfg) => cfg,
        Err(code) => return Ok(code),
    };
    let runs = open_query(&cfg)?.list(args.case_id.as_deref())?;

    if args.format == "text" {
        if runs.is_empty() {
            eprintln!("no runs");
        }
        for run in &runs {
            println!("{}", summary_line(run));
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&runs)?);
    }
    Ok(exit_codes::OK)
}

pub fn cmd_show(args: ShowArgs, global: &GlobalArgs) -> Result<i32> {
    let cfg = match load_config(global) {
        Ok(cfg) => cfg,
        Err(code) => return Ok(code),
    };
    match open_query(&cfg)?.get(args.id) {
        Ok(detail) => print_json(&serde_json::to_value(detail)?),
        Err(e) => not_found_or(e),
    }
}

pub fn cmd_overlay(args: ShowArgs, global: &GlobalArgs) -> Result<i32> {
    let cfg = match load_config(global) {
        Ok(cfg) => cfg,
        Err(code) => return Ok(code),
    };
    match open_query(&cfg)?.overlay(args.id) {
        Ok(overlay) => print_json(&overlay),
        Err(e) => not_found_or(e),
    }
}

fn print_json(v: &Value) -> Result<i32> {
    println!("{}", serde_json::to_string_pretty(v)?);
    Ok(exit_codes::OK)
}

fn not_found_or(e: QueryError) -> Result<i32> {
    match e {
        QueryError::NotFound(id) => {
            eprintln!("run not found: {id}");
            Ok(exit_codes::NOT_FOUND)
        }
        QueryError::Storage(e) => Err(e),
    }
}

fn summary_line(run: &RunSummary) -> String {
    let when = DateTime::parse_from_rfc3339(&run.created_at)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| run.created_at.clone());
    format!(
        "{:>6}  {}  {:<8}  {:<5}  case={}  model={}",
        run.id,
        when,
        run.stage.as_str(),
        run.status.as_str(),
        run.case_id.as_deref().unwrap_or("-"),
        run.model_ref.as_deref().unwrap_or("-"),
    )
}
