use super::{DispatchOutcome, EngineRequest, EngineTransport};
use async_trait::async_trait;
use std::time::Duration;

pub struct HttpTransport {
    pub client: reqwest::Client,
}

impl HttpTransport {
    /// The timeout bounds the whole exchange, connect through body.
    /// Redirects are not followed: a 3xx is the engine's answer, and the
    /// signed body must never be replayed to another location.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl EngineTransport for HttpTransport {
    async fn post(&self, request: &EngineRequest) -> anyhow::Result<DispatchOutcome> {
        let resp = self
            .client
            .post(request.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(request.signature_header.as_str(), request.signature.as_str())
            .body(request.body.clone())
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.bytes().await?;

        Ok(DispatchOutcome::new(status, body.to_vec()))
    }

    fn transport_name(&self) -> &'static str {
        "http"
    }
}
