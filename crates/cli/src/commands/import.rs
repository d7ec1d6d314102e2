//! Import a hand-pasted test case

use std::path::{Path, PathBuf};

use clap::Args;

use tcharvest::import::{import_paste, write_template, ImportOptions, DEFAULT_KEY_PATTERN};
use tcharvest::HarvestConfig;

use crate::output;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Paste file; created with instructions when missing
    #[arg(short, long, default_value = "paste-testcase-here.txt")]
    pub input: PathBuf,

    /// Output directory (default: the configured one)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Regex matching the test-case key
    #[arg(long, default_value = DEFAULT_KEY_PATTERN)]
    pub key_pattern: String,

    /// Keep the paste file instead of resetting it
    #[arg(long)]
    pub keep: bool,
}

pub fn execute(args: ImportArgs, config_path: &Path) -> anyhow::Result<()> {
    if !args.input.exists() {
        write_template(&args.input)?;
        output::print_info(&format!(
            "Created {}. Paste a test case below the marker line and run again.",
            args.input.display()
        ));
        return Ok(());
    }

    let config = HarvestConfig::load(config_path)?;
    let options = ImportOptions {
        input: args.input.clone(),
        output_dir: args.output_dir.unwrap_or(config.output_dir),
        key_pattern: args.key_pattern,
        max_name_len: config.extraction.max_file_name_len,
        reset: !args.keep,
    };

    let outcome = import_paste(&options)?;
    output::print_success(&format!("Saved {}", outcome.case.key));
    println!("   File:     {}", outcome.artifact.file_name);
    println!("   Location: {}", options.output_dir.display());
    if options.reset {
        output::print_info(&format!(
            "{} has been reset for the next test case",
            args.input.display()
        ));
    }
    Ok(())
}
