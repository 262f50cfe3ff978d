use std::time::Duration;

use clap::{Parser, Subcommand};
use url::Url;

#[derive(Parser)]
#[command(name = "ahx-keys")]
#[command(about = "Manage AHX signing keys, tokens and revocations")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the TOML config file (defaults to ./ahx.toml if present)
    #[arg(short, long, global = true, env = "AHX_CONFIG")]
    pub config: Option<String>,

    /// Request URL whose host is used as the token issuer
    #[arg(long, global = true, env = "AHX_ISSUER", default_value = "http://localhost")]
    pub issuer: Url,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load the signing key pair, generating one if the store is empty
    Init,
    /// Archive the current public key and generate a new pair
    Rotate,
    /// Delete archived public keys older than the retention window
    PurgeKeys(PurgeKeysArgs),
    /// Delete revocation records that can no longer matter
    PurgeRevoked,
    /// Print the public key set
    Jwks,
    /// Issue a token signed with the current key
    Issue(IssueArgs),
    /// Verify a token and print its claims
    Verify(VerifyArgs),
    /// Revoke a token
    Revoke(RevokeArgs),
    /// Print the effective configuration as TOML
    ShowConfig,
}

#[derive(clap::Args)]
pub struct PurgeKeysArgs {
    /// Retention window, e.g. "14d" (defaults to the configured value)
    #[arg(long, value_parser = parse_duration)]
    pub max_age: Option<Duration>,
}

#[derive(clap::Args)]
pub struct IssueArgs {
    /// Subject claim
    #[arg(long)]
    pub sub: Option<String>,
    /// Extra claims as a JSON object
    #[arg(long)]
    pub claims: Option<String>,
    /// Token lifetime, e.g. "15m" (defaults to the configured value)
    #[arg(long, value_parser = parse_duration)]
    pub lifetime: Option<Duration>,
    /// Also issue a refresh token
    #[arg(long)]
    pub refresh: bool,
}

#[derive(clap::Args)]
pub struct VerifyArgs {
    /// Compact token
    pub token: String,
    /// Accept expired tokens
    #[arg(long)]
    pub allow_expired: bool,
    /// Verify against a remote JWKS instead of the local keys
    #[arg(long)]
    pub jwks_url: Option<Url>,
}

#[derive(clap::Args)]
pub struct RevokeArgs {
    /// Compact token
    pub token: String,
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_purge_keys() {
        let cli = Cli::try_parse_from(["ahx-keys", "purge-keys", "--max-age", "2h"]).unwrap();
        match cli.command {
            Commands::PurgeKeys(args) => {
                assert_eq!(args.max_age, Some(Duration::from_secs(7200)));
            }
            _ => panic!("expected purge-keys"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_duration() {
        assert!(Cli::try_parse_from(["ahx-keys", "issue", "--lifetime", "soon"]).is_err());
    }

    #[test]
    fn test_cli_issuer_flag() {
        let cli = Cli::try_parse_from([
            "ahx-keys",
            "verify",
            "a.b.c",
            "--issuer",
            "https://addon.example.com/",
        ])
        .unwrap();
        assert_eq!(cli.issuer.host_str(), Some("addon.example.com"));
    }

    #[test]
    fn test_cli_verify_args() {
        let cli = Cli::try_parse_from(["ahx-keys", "verify", "a.b.c", "--allow-expired"]).unwrap();
        match cli.command {
            Commands::Verify(args) => {
                assert_eq!(args.token, "a.b.c");
                assert!(args.allow_expired);
                assert!(args.jwks_url.is_none());
            }
            _ => panic!("expected verify"),
        }
    }
}
