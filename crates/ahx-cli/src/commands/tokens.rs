use ahx_auth::supplier::KeySupplier;
use ahx_auth::{
    CreateTokenOptions, JwtClaims, RemoteJwks, VerifyMode, create_token, create_tokens,
    verify_token,
};
use anyhow::{Context as _, Result, bail};
use serde_json::{Map, Value};

use super::Context;
use crate::cli::{IssueArgs, VerifyArgs};
use crate::output::{print_json, print_success};

pub async fn issue(ctx: &Context, args: &IssueArgs) -> Result<()> {
    let mut claims = match &args.claims {
        Some(raw) => {
            let map: Map<String, Value> =
                serde_json::from_str(raw).context("--claims must be a JSON object")?;
            JwtClaims::from(map)
        }
        None => JwtClaims::new(),
    };
    if let Some(sub) = &args.sub {
        claims.insert("sub", sub.as_str());
    }

    let mut options = CreateTokenOptions::from_config(&ctx.config.auth);
    if let Some(lifetime) = args.lifetime {
        options = options.with_lifetime(lifetime);
    }

    if args.refresh {
        match create_tokens(&ctx.request, &ctx.keys, claims, &options).await? {
            Some(tokens) => print_json(&tokens),
            None => bail!("the signing key cannot sign tokens"),
        }
    } else {
        match create_token(&ctx.request, &ctx.keys, claims, &options).await? {
            Some(token) => {
                println!("{token}");
                Ok(())
            }
            None => bail!("the signing key cannot sign tokens"),
        }
    }
}

pub async fn verify(ctx: &Context, args: &VerifyArgs) -> Result<()> {
    let mode = if args.allow_expired {
        VerifyMode::Refresh
    } else {
        VerifyMode::Access
    };

    let remote;
    let supplier: &dyn KeySupplier = match &args.jwks_url {
        Some(url) => {
            remote = RemoteJwks::new(url.clone(), ctx.config.auth.remote_jwks.clone())?;
            &remote
        }
        None => &ctx.keys,
    };

    let Some(claims) = verify_token(&ctx.request, &args.token, supplier, mode).await? else {
        bail!("token rejected");
    };
    if args.jwks_url.is_none() && ctx.revocations.is_token_revoked(&ctx.request, &claims).await? {
        bail!("token revoked");
    }

    print_json(&claims)
}

pub async fn revoke(ctx: &Context, token: &str) -> Result<()> {
    if !ctx.revocations.revoke_token(&ctx.request, token).await? {
        bail!("token does not verify or has no jti");
    }
    print_success("token revoked");
    Ok(())
}

pub async fn purge_revoked(ctx: &Context) -> Result<()> {
    let expired = ctx.revocations.purge_expiring_revocations().await?;
    let unverifiable = ctx
        .revocations
        .purge_infinite_revocations(&ctx.request, &ctx.keys)
        .await?;
    print_success(&format!(
        "purged {expired} expired and {unverifiable} unverifiable revocation(s)"
    ));
    Ok(())
}
