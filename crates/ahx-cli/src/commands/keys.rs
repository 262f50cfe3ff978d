use std::time::Duration;

use anyhow::Result;

use super::Context;
use crate::output::{print_json, print_success};

pub async fn init(ctx: &Context) -> Result<()> {
    ctx.keys.init().await?;
    let key = ctx.keys.signing_key().await?;
    print_success(&format!(
        "signing key {} ({})",
        key.kid().unwrap_or("-"),
        ctx.config.auth.signing.algorithm
    ));
    Ok(())
}

pub async fn rotate(ctx: &Context) -> Result<()> {
    ctx.keys.rotate_keys().await?;
    let key = ctx.keys.signing_key().await?;
    print_success(&format!("rotated, new signing key {}", key.kid().unwrap_or("-")));
    Ok(())
}

pub async fn purge(ctx: &Context, max_age: Option<Duration>) -> Result<()> {
    let purged = match max_age {
        Some(max_age) => ctx.keys.purge_archived_keys(max_age).await?,
        None => ctx.keys.purge_expired_keys().await?,
    };
    print_success(&format!("purged {purged} archived key(s)"));
    Ok(())
}

pub async fn jwks(ctx: &Context) -> Result<()> {
    print_json(&ctx.keys.jwks().await?)
}
