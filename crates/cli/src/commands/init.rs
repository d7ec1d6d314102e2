//! Write a default configuration file

use std::path::{Path, PathBuf};

use clap::Args;

use tcharvest::HarvestConfig;

use crate::output;

#[derive(Args, Debug)]
pub struct InitConfigArgs {
    /// Target path (default: the global --config path)
    pub path: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

pub fn execute(args: InitConfigArgs, config_path: &Path) -> anyhow::Result<()> {
    let path = args.path.unwrap_or_else(|| config_path.to_path_buf());
    if path.exists() && !args.force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    HarvestConfig::default().save(&path)?;
    output::print_success(&format!("Wrote default configuration to {}", path.display()));
    Ok(())
}
