use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use client_core::Session;
use shared::domain::WindowMode;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod editor;
mod fsys;
mod identity;
mod shutdown;

use config::{Args, Settings};
use editor::AcmeHost;
use fsys::NinepFs;
use identity::Identity;
use shutdown::ProcessShutdown;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load(&args)?;
    init_tracing(&settings.log_filter);

    let identity = Identity::current();
    info!(uid = identity.uid, user = %identity.name, "starting");

    let network: ninep::Network = settings.network.parse()?;
    let feed = ninep::Client::dial(
        network,
        &settings.address,
        &identity.name,
        ninep::DEFAULT_MSIZE,
    )
    .await
    .with_context(|| format!("mounting {} {}", settings.network, settings.address))?;
    info!(address = %settings.address, msize = feed.msize(), "mounted feed service");

    let namespace = match settings.namespace.clone() {
        Some(namespace) => namespace,
        None => acme::namespace().ok_or(acme::AcmeError::NoNamespace)?,
    };
    let editor = acme::Acme::connect(&namespace, &identity.name)
        .await
        .with_context(|| format!("connecting to acme in {}", namespace.display()))?;

    let fsys = Arc::new(NinepFs::new(feed));
    let shutdown = Arc::new(ProcessShutdown::new(fsys.clone()));
    let session = Session::new(fsys, Arc::new(AcmeHost::new(editor)), shutdown);

    session.open(WindowMode::Home).await;
    session.open(WindowMode::Mentions).await;

    // Windows run on their own tasks; the registry exits the process once
    // the last one closes.
    std::future::pending::<()>().await;
    Ok(())
}

fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
