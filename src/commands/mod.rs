use crate::cli::Cli;
use anyhow::Result;

mod translate;

pub fn execute(cli: Cli) -> Result<()> {
    // Usage errors are reported before any module is touched
    let jobs = cli.jobs()?;
    translate::execute(cli.mode, &cli.mod_paths, &jobs)
}
