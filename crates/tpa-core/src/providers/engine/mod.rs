use async_trait::async_trait;

/// Status recorded when the engine could not be reached at all
/// (refused, DNS, timeout). Never a valid HTTP status.
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

/// Raw result of one POST to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub http_status: u16,
    pub raw_body: Vec<u8>,
}

impl DispatchOutcome {
    pub fn new(http_status: u16, raw_body: impl Into<Vec<u8>>) -> Self {
        Self {
            http_status,
            raw_body: raw_body.into(),
        }
    }

    pub fn transport_failure() -> Self {
        Self {
            http_status: TRANSPORT_FAILURE_STATUS,
            raw_body: Vec::new(),
        }
    }

    pub fn is_transport_failure(&self) -> bool {
        self.http_status == TRANSPORT_FAILURE_STATUS
    }
}

/// A signed request, ready to send. `body` is exactly the bytes the
/// signature was computed over.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRequest {
    pub url: reqwest::Url,
    pub signature_header: String,
    pub signature: String,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait EngineTransport: Send + Sync {
    /// Sends the request once. `Err` means the engine was never reached;
    /// any HTTP response, whatever its status, is `Ok`.
    async fn post(&self, request: &EngineRequest) -> anyhow::Result<DispatchOutcome>;
    fn transport_name(&self) -> &'static str;
}

pub mod fake;
pub mod http;
