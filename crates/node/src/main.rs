use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ringlet_core::NodePool;
use ringlet_core::PeerRef;
use ringlet_node::cli::Cli;
use ringlet_node::client::HttpTransport;
use ringlet_node::config;
use ringlet_node::logging;
use ringlet_node::service;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level.clone().into())?;

    let settings = config::load(&cli)?;
    let ring = settings.ring.clone();
    tracing::info!(
        "starting ringlet node on {} (advertised as {})",
        settings.bind,
        settings.advertised
    );

    let transport = Arc::new(HttpTransport::new(
        ring.rpc_deadline(),
        ring.ring_bit_width,
    )?);
    let pool = NodePool::builder(settings.advertised, transport)
        .config(ring.clone())
        .build()?;

    // Join an existing ring through the bootstrap peer, or form our own.
    match &ring.bootstrap_peer_address {
        Some(peer) => {
            let addr = peer
                .parse()
                .with_context(|| format!("invalid bootstrap peer address {peer:?}"))?;
            let gateway = PeerRef::from_addr(addr, ring.ring_bit_width);
            pool.local()
                .join(Some(&gateway))
                .await
                .with_context(|| format!("could not join the ring through {gateway}"))?;
        }
        None => pool.local().join(None).await?,
    }

    let server = {
        let pool = pool.clone();
        tokio::spawn(service::run_service(settings.bind, pool))
    };

    let ticker = {
        let pool = pool.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(ring.maintenance_interval());
            // The first interval tick fires immediately; the ring was
            // set up just now, so skip it.
            tick.tick().await;
            loop {
                tick.tick().await;
                pool.tick().await;
            }
        })
    };

    tokio::select! {
        served = server => served??,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            ticker.abort();
        }
    }
    Ok(())
}
