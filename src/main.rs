use anyhow::Result;

mod cli;
mod core;

use cli::commands::run_cli;

fn main() -> Result<()> {
    run_cli()
}
