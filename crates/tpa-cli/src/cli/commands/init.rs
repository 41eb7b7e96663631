use super::exit_codes;
use crate::cli::args::InitArgs;
use anyhow::Result;

pub fn cmd_init(args: InitArgs) -> Result<i32> {
    if args.out.exists() && !args.force {
        eprintln!(
            "{} already exists (use --force to overwrite)",
            args.out.display()
        );
        return Ok(exit_codes::CONFIG_ERROR);
    }
    tpa_core::config::write_sample_config(&args.out)?;
    println!("Created {}", args.out.display());
    println!("Set TPA_ENGINE_SECRET and enabled: true before running assessments.");
    Ok(exit_codes::OK)
}
