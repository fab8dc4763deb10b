use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use nightstack_core::pipeline::config::{PathsConfig, PipelineConfig};

#[derive(Args)]
pub struct ConfigArgs {
    /// Target name to put in the config
    #[arg(short, long, default_value = "NGC 281")]
    pub target: String,

    /// Write config to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Print or save a full default PipelineConfig as TOML.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let config = PipelineConfig::new(
        args.target.clone(),
        PathsConfig::new("/data/astro/repo", "/data/astro/work"),
    );
    let toml_str = toml::to_string_pretty(&config)?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Default config saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    Ok(())
}
