use crate::cli::args::{Cli, Command, GlobalArgs};
use tpa_core::{BridgeConfig, ConfigError};
use tracing_subscriber::EnvFilter;

pub mod init;
pub mod run;
pub mod runs;

pub mod exit_codes {
    pub const OK: i32 = 0;
    /// The run was stored, but the engine failed or was unreachable.
    pub const RUN_FAILED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
    pub const NOT_FOUND: i32 = 3;
    pub const DISABLED: i32 = 4;
    /// Storage, I/O or any other failure that is not about configuration.
    pub const INTERNAL_ERROR: i32 = 5;
}

/// Exit code for an error that escaped a command.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.chain().any(|e| e.is::<ConfigError>()) {
        exit_codes::CONFIG_ERROR
    } else {
        exit_codes::INTERNAL_ERROR
    }
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Run(args) => run::cmd_run(args, &cli.global).await,
        Command::List(args) => runs::cmd_list(args, &cli.global),
        Command::Show(args) => runs::cmd_show(args, &cli.global),
        Command::Overlay(args) => runs::cmd_overlay(args, &cli.global),
        Command::Init(args) => init::cmd_init(args),
    }
}

/// Resolves config, applies `--db`, and installs the stderr subscriber.
/// On failure the error is already printed and the exit code is returned.
pub(crate) fn load_config(global: &GlobalArgs) -> Result<BridgeConfig, i32> {
    let mut cfg = match BridgeConfig::resolve(global.config.as_deref(), global.strict_config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("config error: {e}");
            return Err(exit_codes::CONFIG_ERROR);
        }
    };
    if let Some(db) = &global.db {
        cfg.db_path = db.clone();
    }
    init_logging(&cfg.log_level);
    Ok(cfg)
}

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries command output only
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn config_errors_map_to_config_exit_code() {
        let err = anyhow::Error::from(ConfigError("invalid engine_url".into()));
        assert_eq!(exit_code_for(&err), exit_codes::CONFIG_ERROR);

        let wrapped = Err::<(), _>(ConfigError("bad".into()))
            .context("building bridge")
            .unwrap_err();
        assert_eq!(exit_code_for(&wrapped), exit_codes::CONFIG_ERROR);
    }

    #[test]
    fn other_errors_are_internal() {
        let err = anyhow::anyhow!("sqlite connection lock poisoned");
        assert_eq!(exit_code_for(&err), exit_codes::INTERNAL_ERROR);
    }
}
