//! Rocforge CLI: the `rocforge` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Patch { package, pip, json } => commands::patch::run(package, pip, json),

        Commands::Status { package, pip, json } => commands::status::run(package, pip, json),

        Commands::Provision {
            workdir,
            stk_url,
            stk_rev,
            moe_url,
            moe_rev,
            package,
            pip,
            git,
            json,
        } => commands::provision::run(commands::provision::Args {
            workdir,
            stk_url,
            stk_rev,
            moe_url,
            moe_rev,
            package,
            pip,
            git,
            json,
        }),
    }
}
