use crate::cases::{CaseDirectory, FileCaseDirectory, NoCases};
use crate::config::BridgeConfig;
use crate::dispatch::SigningDispatcher;
use crate::model::{CreatedRun, NewRun, Stage};
use crate::providers::engine::http::HttpTransport;
use crate::providers::engine::EngineTransport;
use crate::query::QueryService;
use crate::storage::Store;
use crate::{envelope, evidence, ingest};
use anyhow::Context;
use std::sync::Arc;

/// Runs one assessment end to end: build, dispatch, ingest, persist.
pub struct AssessmentBridge {
    pub store: Store,
    pub dispatcher: SigningDispatcher,
    pub cases: Arc<dyn CaseDirectory>,
}

impl AssessmentBridge {
    pub fn new(store: Store, dispatcher: SigningDispatcher, cases: Arc<dyn CaseDirectory>) -> Self {
        Self {
            store,
            dispatcher,
            cases,
        }
    }

    /// Opens the store and wires the HTTP transport from configuration.
    pub fn from_config(cfg: &BridgeConfig) -> anyhow::Result<Self> {
        let transport: Arc<dyn EngineTransport> = Arc::new(HttpTransport::new(cfg.timeout())?);
        Self::with_transport(cfg, transport)
    }

    pub fn with_transport(
        cfg: &BridgeConfig,
        transport: Arc<dyn EngineTransport>,
    ) -> anyhow::Result<Self> {
        let store = Store::open(&cfg.db_path)?;
        store.init_schema()?;

        let cases: Arc<dyn CaseDirectory> = match &cfg.cases_file {
            Some(path) => {
                let dir = FileCaseDirectory::load(path)?;
                tracing::info!(event = "cases_loaded", path = %path.display(), count = dir.len());
                Arc::new(dir)
            }
            None => Arc::new(NoCases),
        };

        let dispatcher = SigningDispatcher::from_config(cfg, transport)?;
        Ok(Self::new(store, dispatcher, cases))
    }

    pub fn query(&self) -> QueryService {
        QueryService::new(self.store.clone())
    }

    /// Engine failures end up in a stored `error` run, never in `Err`.
    /// `Err` is reserved for the store itself failing.
    pub async fn create(&self, case_id: Option<&str>, stage: Stage) -> anyhow::Result<CreatedRun> {
        let requested = case_id.map(str::trim).filter(|s| !s.is_empty());

        let (envelope, case_ref) = {
            let case = requested.and_then(|id| self.cases.find(id));
            if let (Some(id), None) = (requested, case.as_ref()) {
                tracing::info!(event = "case_not_found", case_id = %id);
            }
            let case_ref = case.as_ref().and_then(|c| c.id());
            let source = case.as_deref().map(|c| c as &dyn crate::cases::CaseSource);
            (envelope::build(source), case_ref)
        };

        let outcome = self.dispatcher.dispatch(&envelope, stage).await;
        let ingested = ingest::ingest(&outcome);
        let records = evidence::extract(&ingested.payload);

        let run = NewRun {
            case_id: case_ref,
            stage,
            status: ingested.status,
            payload: ingested.payload,
            model_ref: ingested.model_ref,
            latency_ms: ingested.latency_ms,
        };
        let evidence_count = records.len();

        // SQLite writes block; keep them off the async workers.
        let store = self.store.clone();
        let (id, run) = tokio::task::spawn_blocking(move || {
            store.record_run(&run, &records).map(|id| (id, run))
        })
        .await
        .context("run persistence task failed")??;

        tracing::info!(
            event = "run_recorded",
            run_id = id,
            case_id = ?run.case_id,
            stage = %stage,
            status = run.status.as_str(),
            http_status = outcome.http_status,
            evidence = evidence_count,
        );

        Ok(CreatedRun {
            id,
            result: run.payload,
        })
    }
}
