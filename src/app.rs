use crate::cli::{Cli, Command};
use crate::commands;
use crate::context::AppContext;
use crate::error::AppResult;

pub async fn run(cli: Cli) -> AppResult<()> {
    let Cli {
        profile,
        json,
        verbose: _,
        command,
    } = cli;

    let ctx = AppContext::bootstrap(profile, json)?;

    match command {
        Command::Run => commands::run::run(&ctx).await,
        Command::Cycle => commands::cycle::run(&ctx).await,
        Command::Label(args) => commands::label::run(&ctx, args.command).await,
        Command::Auth(args) => commands::auth::run(&ctx, args.command).await,
    }
}
