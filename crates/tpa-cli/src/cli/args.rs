use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tpa",
    version,
    about = "Dispatch planning assessments to the engine and inspect stored runs"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(clap::Args, Debug, Clone)]
pub struct GlobalArgs {
    /// YAML config file; TPA_* environment variables override it
    #[arg(long, global = true, env = "TPA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Run database (overrides db_path from config and TPA_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Reject unknown keys in the config file
    #[arg(long, global = true)]
    pub strict_config: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build an envelope, send it to the engine and record the run
    Run(RunArgs),
    /// List recent runs, newest first
    List(ListArgs),
    /// Show one run with its payload sections
    Show(ShowArgs),
    /// Print the map overlay of a run as GeoJSON
    Overlay(ShowArgs),
    /// Write a sample config file
    Init(InitArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Case to assess; unknown or absent ids run as a local case
    #[arg(long)]
    pub case_id: Option<String>,

    /// assess | validate | notice (anything else runs as assess)
    #[arg(long, default_value = "assess")]
    pub stage: String,

    /// Print the full engine payload instead of the run summary
    #[arg(long)]
    pub payload: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ListArgs {
    #[arg(long)]
    pub case_id: Option<String>,

    /// Output format: json | text
    #[arg(long, default_value = "json")]
    pub format: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ShowArgs {
    pub id: i64,
}

#[derive(clap::Args, Debug, Clone)]
pub struct InitArgs {
    #[arg(long, default_value = "tpa.yaml")]
    pub out: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}
