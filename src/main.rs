// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::Context as _;
use structopt::StructOpt;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, info, info_span, warn};
use tracing_futures::Instrument;
use tracing_subscriber::EnvFilter;

mod capture;
mod image_buffer;
mod overlay;
mod pipeline;
mod render;
mod sensor;
mod settings;
mod temperature;
mod util;

use crate::capture::capture_still;
use crate::pipeline::Pipeline;
use crate::settings::{Args, Settings};

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => Some(terminate),
        Err(err) => {
            warn!("Unable to listen for SIGTERM: {}", err);
            None
        }
    };
    let sigterm = async {
        match terminate.as_mut() {
            Some(terminate) => {
                terminate.recv().await;
            }
            None => futures::future::pending::<()>().await,
        }
    };
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Unable to listen for Ctrl-C: {}", err);
            futures::future::pending::<()>().await;
        }
    };
    tokio::select! {
        _ = ctrl_c => debug!("Received Ctrl-C"),
        _ = sigterm => debug!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let args = Args::from_args();
    let settings = Settings::load(&args)?;
    debug!(?settings, "Loaded settings");
    let still = capture_still(&settings.capture)
        .await
        .context("Unable to capture a still frame")?;
    let pipeline = Pipeline::open(&settings, &still)?;
    pipeline
        .run(shutdown_signal())
        .instrument(info_span!("overlay"))
        .await?;
    info!("Exiting");
    Ok(())
}
