use anyhow::Result;
use clap::Args;
use nightstack_core::pipeline::plan_pipeline;

use super::TargetArgs;

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub source: TargetArgs,

    /// Also list the output paths of each stage
    #[arg(long)]
    pub outputs: bool,
}

pub fn run(args: &PlanArgs) -> Result<()> {
    let config = args.source.load()?;
    let plan = plan_pipeline(&config)?;
    crate::summary::print_plan(&plan, args.outputs);
    Ok(())
}
