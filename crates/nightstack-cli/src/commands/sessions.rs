use anyhow::Result;
use clap::Args;
use nightstack_core::discovery::inventory;

use super::TargetArgs;

#[derive(Args)]
pub struct SessionsArgs {
    #[command(flatten)]
    pub source: TargetArgs,
}

pub fn run(args: &SessionsArgs) -> Result<()> {
    // Discovery only reads the repository, so --work is optional here.
    let (repo, target) = match (&args.source.repo, &args.source.target) {
        (Some(repo), Some(target)) => (repo.clone(), target.clone()),
        _ => {
            let config = args.source.load()?;
            (config.paths.repo, config.target)
        }
    };
    let inv = inventory(&repo, &target)?;
    crate::summary::print_inventory(&inv);
    Ok(())
}
