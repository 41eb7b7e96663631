use crate::config::BridgeConfig;
use crate::envelope::Envelope;
use crate::errors::ConfigError;
use crate::model::Stage;
use crate::providers::engine::{DispatchOutcome, EngineRequest, EngineTransport};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// hex(HMAC-SHA256(secret, body))
pub fn sign(secret: &[u8], body: &[u8]) -> anyhow::Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| anyhow::anyhow!("invalid HMAC key: {}", e))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature, for receivers of signed bodies.
pub fn verify(secret: &[u8], body: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Signs envelopes and sends them to the stage endpoint of the engine.
pub struct SigningDispatcher {
    base_url: reqwest::Url,
    secret: Vec<u8>,
    signature_header: String,
    transport: Arc<dyn EngineTransport>,
}

impl SigningDispatcher {
    pub fn new(
        engine_url: &str,
        secret: &[u8],
        signature_header: &str,
        transport: Arc<dyn EngineTransport>,
    ) -> Result<Self, ConfigError> {
        // Trailing slash so that joining appends a segment instead of
        // replacing the last one.
        let base = format!("{}/", engine_url.trim_end_matches('/'));
        let base_url = reqwest::Url::parse(&base)
            .map_err(|e| ConfigError(format!("invalid engine_url {:?}: {}", engine_url, e)))?;
        Ok(Self {
            base_url,
            secret: secret.to_vec(),
            signature_header: signature_header.to_string(),
            transport,
        })
    }

    pub fn from_config(
        cfg: &BridgeConfig,
        transport: Arc<dyn EngineTransport>,
    ) -> Result<Self, ConfigError> {
        Self::new(
            &cfg.engine_url,
            cfg.secret_bytes(),
            &cfg.signature_header,
            transport,
        )
    }

    pub fn endpoint(&self, stage: Stage) -> anyhow::Result<reqwest::Url> {
        Ok(self.base_url.join(stage.endpoint_path())?)
    }

    /// Serializes once and signs those same bytes.
    pub fn prepare(&self, envelope: &Envelope, stage: Stage) -> anyhow::Result<EngineRequest> {
        let body = serde_json::to_vec(envelope)?;
        let signature = sign(&self.secret, &body)?;
        Ok(EngineRequest {
            url: self.endpoint(stage)?,
            signature_header: self.signature_header.clone(),
            signature,
            body,
        })
    }

    /// One attempt, no retry. Never fails: anything that keeps the request
    /// from getting an HTTP answer becomes the transport-failure sentinel.
    pub async fn dispatch(&self, envelope: &Envelope, stage: Stage) -> DispatchOutcome {
        let request = match self.prepare(envelope, stage) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(event = "envelope_prepare_failed", stage = %stage, error = %e);
                return DispatchOutcome::transport_failure();
            }
        };

        let start = std::time::Instant::now();
        tracing::info!(
            event = "run_dispatch",
            stage = %stage,
            url = %request.url,
            transport = self.transport.transport_name(),
            bytes_out = request.body.len(),
        );

        match self.transport.post(&request).await {
            Ok(outcome) => {
                tracing::info!(
                    event = "run_dispatch_done",
                    stage = %stage,
                    http_status = outcome.http_status,
                    bytes_in = outcome.raw_body.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                );
                outcome
            }
            Err(e) => {
                tracing::warn!(
                    event = "engine_transport_failed",
                    stage = %stage,
                    url = %request.url,
                    duration_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                );
                DispatchOutcome::transport_failure()
            }
        }
    }
}
