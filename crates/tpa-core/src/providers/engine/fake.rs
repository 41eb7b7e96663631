use super::{DispatchOutcome, EngineRequest, EngineTransport};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum FakeReply {
    Respond(DispatchOutcome),
    Unreachable,
}

/// In-process engine for tests and dry runs. Records every request it sees.
pub struct FakeTransport {
    reply: FakeReply,
    seen: Mutex<Vec<EngineRequest>>,
}

impl FakeTransport {
    pub fn responding(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            reply: FakeReply::Respond(DispatchOutcome::new(status, body)),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn responding_json(status: u16, body: &serde_json::Value) -> Self {
        Self::responding(status, body.to_string())
    }

    pub fn unreachable() -> Self {
        Self {
            reply: FakeReply::Unreachable,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<EngineRequest> {
        self.seen.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EngineTransport for FakeTransport {
    async fn post(&self, request: &EngineRequest) -> anyhow::Result<DispatchOutcome> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(request.clone());
        }
        match &self.reply {
            FakeReply::Respond(outcome) => Ok(outcome.clone()),
            FakeReply::Unreachable => anyhow::bail!("connection refused ({})", request.url),
        }
    }

    fn transport_name(&self) -> &'static str {
        "fake"
    }
}
