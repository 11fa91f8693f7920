//! Social node entry point
//!
//! Run with:
//! ```bash
//! cargo run -p social-node
//! ```
//!
//! Configuration is loaded from environment variables (and `.env`).
//! Without `INITIAL_AUTH_TOKEN` the node signs in as a fresh anonymous user.

use std::sync::Arc;

use anyhow::Context;
use social_common::{try_init_tracing_with_config, AppConfig, TracingConfig};
use social_core::{IdGenerator, StaticIdentity, UserId};
use social_service::{ServiceContext, SocialSession, ViewEvent};
use social_store::MemoryStore;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %format!("{e:#}"), "Node failed");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;

    // Initialize tracing
    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        env = ?config.app.env,
        app_id = %config.app.app_id,
        write_timeout_ms = config.store.write_timeout_ms,
        "Configuration loaded"
    );

    let store = Arc::new(MemoryStore::with_options(
        config.store.worker_id,
        &config.store.options,
    ));
    let ctx = ServiceContext::from_config(store, &config);
    let identity = sign_in(&config)?;
    let session = SocialSession::new(&ctx, &identity);
    let me = session.user_id()?;
    info!(user_id = %me, "Signed in");

    let _feed = session.feed(|event| match event {
        ViewEvent::Snapshot(posts) => info!(posts = posts.len(), "Feed updated"),
        ViewEvent::Stale(posts) => warn!(posts = posts.len(), "Feed stale, reconnecting"),
        ViewEvent::Failed { attempts, .. } => error!(attempts, "Feed unavailable"),
    })?;
    let _following = session.following(|event| {
        if let Some(followees) = event.data() {
            info!(count = followees.len(), stale = event.is_stale(), "Following updated");
        }
    })?;

    let post = session.post("Hello from social-node").await?;
    session.like(&post.id).await?;

    let echo = UserId::parse("echo")?;
    session.follow(&echo).await?;
    let _thread = session.thread(&echo, |event| {
        if let Some(messages) = event.data() {
            if let Some(last) = messages.last() {
                info!(from = %last.sender_id, text = %last.text, "Thread updated");
            }
        }
    })?;
    session.message(&echo, "ping").await?;

    info!("Node running, press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!(
        active_views = ctx.coordinator().active_views(),
        "Shutting down"
    );
    Ok(())
}

/// Resolve the identity for this node from the initial auth token
fn sign_in(config: &AppConfig) -> anyhow::Result<StaticIdentity> {
    match config.auth.initial_auth_token.as_deref() {
        Some(token) => StaticIdentity::from_token(Some(token)).context("invalid INITIAL_AUTH_TOKEN"),
        None => {
            let id = IdGenerator::new(config.store.worker_id).generate();
            Ok(StaticIdentity::new(UserId::parse(format!("anon-{id}"))?))
        }
    }
}
