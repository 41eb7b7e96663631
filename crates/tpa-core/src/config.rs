use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENGINE_URL: &str = "http://localhost:8000";
pub const DEFAULT_SIGNATURE_HEADER: &str = "x-signature";

/// Process-wide bridge settings. Built once at startup and passed down;
/// nothing in the core reads the environment on its own.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Base URL of the assessment engine; the stage path is appended to it.
    pub engine_url: String,
    /// Shared HMAC secret for request signing.
    pub secret: Option<String>,
    /// Feature gate for every inbound endpoint.
    pub enabled: bool,
    pub timeout_ms: u64,
    pub signature_header: String,
    pub db_path: PathBuf,
    pub bind: String,
    pub log_level: String,
    /// Optional YAML/JSON list of cases used to resolve `case_id` on create.
    pub cases_file: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            engine_url: DEFAULT_ENGINE_URL.to_string(),
            secret: None,
            enabled: false,
            timeout_ms: 30_000,
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            db_path: PathBuf::from(".tpa/runs.db"),
            bind: "127.0.0.1:8080".to_string(),
            log_level: "info".to_string(),
            cases_file: None,
        }
    }
}

impl std::fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("engine_url", &self.engine_url)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("enabled", &self.enabled)
            .field("timeout_ms", &self.timeout_ms)
            .field("signature_header", &self.signature_header)
            .field("db_path", &self.db_path)
            .field("bind", &self.bind)
            .field("log_level", &self.log_level)
            .field("cases_file", &self.cases_file)
            .finish()
    }
}

impl BridgeConfig {
    /// File (if any), then environment, then validation.
    pub fn resolve(path: Option<&Path>, strict: bool) -> Result<Self, ConfigError> {
        let mut cfg = match path {
            Some(p) => Self::load(p, strict)?,
            None => Self::default(),
        };
        cfg.apply_env(|k| std::env::var(k).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path, strict: bool) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;
        Self::from_yaml_str(&raw, strict)
            .map_err(|e| ConfigError(format!("{} (file: {})", e, path.display())))
    }

    pub fn from_yaml_str(raw: &str, strict: bool) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut ignored_keys = std::collections::BTreeSet::new();
        let deserializer = serde_yaml::Deserializer::from_str(raw);
        let cfg: BridgeConfig = serde_ignored::deserialize(deserializer, |path| {
            ignored_keys.insert(path.to_string());
        })
        .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

        if !ignored_keys.is_empty() {
            if strict {
                return Err(ConfigError(format!(
                    "Unknown fields detected in strict mode: {:?}",
                    ignored_keys
                )));
            }
            // Config is read before the subscriber is installed.
            eprintln!("WARN: Ignored unknown config fields: {:?}", ignored_keys);
        }

        Ok(cfg)
    }

    /// Applies `TPA_*` overrides. The lookup is injected so tests do not
    /// have to mutate the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("TPA_ENGINE_URL") {
            self.engine_url = v;
        }
        if let Some(v) = lookup("TPA_ENGINE_SECRET") {
            self.secret = Some(v);
        }
        if let Some(v) = lookup("TPA_ENABLED") {
            self.enabled = parse_flag(&v);
        }
        if let Some(v) = lookup("TPA_ENGINE_TIMEOUT_MS") {
            self.timeout_ms = v.trim().parse().map_err(|_| {
                ConfigError(format!("TPA_ENGINE_TIMEOUT_MS is not a number: {:?}", v))
            })?;
        }
        if let Some(v) = lookup("TPA_SIGNATURE_HEADER") {
            self.signature_header = v;
        }
        if let Some(v) = lookup("TPA_DB") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("TPA_BIND") {
            self.bind = v;
        }
        if let Some(v) = lookup("TPA_LOG") {
            self.log_level = v;
        }
        if let Some(v) = lookup("TPA_CASES_FILE") {
            self.cases_file = Some(PathBuf::from(v));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.engine_url)
            .map_err(|e| ConfigError(format!("invalid engine_url {:?}: {}", self.engine_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError(format!(
                "engine_url must be http(s), got scheme {:?}",
                url.scheme()
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError("timeout_ms must be greater than zero".into()));
        }
        if reqwest::header::HeaderName::from_bytes(self.signature_header.as_bytes()).is_err() {
            return Err(ConfigError(format!(
                "signature_header is not a valid header name: {:?}",
                self.signature_header
            )));
        }
        if self.bind.parse::<SocketAddr>().is_err() {
            return Err(ConfigError(format!("bind is not a socket address: {:?}", self.bind)));
        }
        if self.enabled && self.secret.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError(
                "secret is required when the assistant is enabled (set TPA_ENGINE_SECRET)".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn secret_bytes(&self) -> &[u8] {
        self.secret.as_deref().unwrap_or("").as_bytes()
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub fn write_sample_config(path: &Path) -> Result<(), ConfigError> {
    std::fs::write(
        path,
        r#"# Assessment run bridge
engine_url: "http://localhost:8000"
# secret is better supplied through TPA_ENGINE_SECRET
secret: "change-me"
enabled: false
timeout_ms: 30000
signature_header: "x-signature"
db_path: ".tpa/runs.db"
bind: "127.0.0.1:8080"
log_level: "info"
# cases_file: "cases.yaml"
"#,
    )
    .map_err(|e| ConfigError(format!("failed to write sample config: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_are_valid_and_disabled() {
        let cfg = BridgeConfig::default();
        assert!(!cfg.enabled);
        assert_eq!(cfg.engine_url, DEFAULT_ENGINE_URL);
        cfg.validate().unwrap();
    }

    #[test]
    fn env_overrides_file_values() {
        let mut cfg = BridgeConfig::from_yaml_str("engine_url: http://engine:9000\n", true).unwrap();
        cfg.apply_env(env(&[
            ("TPA_ENGINE_URL", "http://other:1"),
            ("TPA_ENABLED", "true"),
            ("TPA_ENGINE_SECRET", "s3cret"),
            ("TPA_ENGINE_TIMEOUT_MS", "1500"),
        ]))
        .unwrap();
        assert_eq!(cfg.engine_url, "http://other:1");
        assert!(cfg.enabled);
        assert_eq!(cfg.timeout(), Duration::from_millis(1500));
        cfg.validate().unwrap();
    }

    #[test]
    fn enabled_without_secret_is_rejected() {
        let mut cfg = BridgeConfig::default();
        cfg.apply_env(env(&[("TPA_ENABLED", "1")])).unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(err.0.contains("secret is required"));
    }

    #[test]
    fn only_truthy_values_enable_the_gate() {
        for (raw, expected) in [("true", true), ("ON", true), ("false", false), ("maybe", false)] {
            let mut cfg = BridgeConfig::default();
            cfg.apply_env(env(&[("TPA_ENABLED", raw)])).unwrap();
            assert_eq!(cfg.enabled, expected, "TPA_ENABLED={raw}");
        }
    }

    #[test]
    fn bad_timeout_and_url_fail_validation() {
        let mut cfg = BridgeConfig::default();
        assert!(cfg.apply_env(env(&[("TPA_ENGINE_TIMEOUT_MS", "soon")])).is_err());

        cfg.timeout_ms = 0;
        assert!(cfg.validate().is_err());

        let cfg = BridgeConfig {
            engine_url: "ftp://engine".into(),
            ..BridgeConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn strict_mode_rejects_unknown_keys() {
        let raw = "engine_url: http://x\nengin_timeout: 5\n";
        assert!(BridgeConfig::from_yaml_str(raw, true).is_err());
        let cfg = BridgeConfig::from_yaml_str(raw, false).unwrap();
        assert_eq!(cfg.engine_url, "http://x");
    }

    #[test]
    fn debug_output_redacts_secret() {
        let cfg = BridgeConfig {
            secret: Some("hunter2".into()),
            ..BridgeConfig::default()
        };
        let rendered = format!("{:?}", cfg);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn sample_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tpa.yaml");
        write_sample_config(&path).unwrap();
        let cfg = BridgeConfig::load(&path, true).unwrap();
        assert_eq!(cfg.signature_header, "x-signature");
        assert!(!cfg.enabled);
    }
}
