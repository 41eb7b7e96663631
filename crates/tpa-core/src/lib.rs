pub mod bridge;
pub mod cases;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod errors;
pub mod evidence;
pub mod ingest;
pub mod model;
pub mod providers;
pub mod query;
pub mod storage;

pub use bridge::AssessmentBridge;
pub use config::BridgeConfig;
pub use errors::{ConfigError, QueryError};
pub use model::{CreatedRun, RunStatus, Stage};
