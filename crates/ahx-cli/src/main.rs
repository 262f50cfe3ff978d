use anyhow::Result;
use clap::Parser;

use ahx_cli::cli::{Cli, Commands};
use ahx_cli::commands::{self, Context};
use ahx_cli::config::load_config;
use ahx_cli::observability::init_tracing_with_level;
use ahx_cli::output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_tracing_with_level(&config.logging.level);

    if matches!(cli.command, Commands::ShowConfig) {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let ctx = Context::open(&config, &cli.issuer)?;

    match &cli.command {
        Commands::Init => commands::keys::init(&ctx).await?,
        Commands::Rotate => commands::keys::rotate(&ctx).await?,
        Commands::PurgeKeys(args) => commands::keys::purge(&ctx, args.max_age).await?,
        Commands::Jwks => commands::keys::jwks(&ctx).await?,
        Commands::PurgeRevoked => commands::tokens::purge_revoked(&ctx).await?,
        Commands::Issue(args) => commands::tokens::issue(&ctx, args).await?,
        Commands::Verify(args) => commands::tokens::verify(&ctx, args).await?,
        Commands::Revoke(args) => commands::tokens::revoke(&ctx, &args.token).await?,
        Commands::ShowConfig => {}
    }

    Ok(())
}
