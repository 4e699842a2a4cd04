use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scenecast_studio::cli::Cli;
use scenecast_studio::config::StudioConfig;
use scenecast_studio::session::{save_artifact, Studio, StudioError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scenecast=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // --- Configuration ---
    let config = StudioConfig::from_env().context("Invalid configuration")?;
    tracing::info!(
        model = %config.model,
        poll_interval_secs = config.poll_interval.as_secs(),
        "Loaded studio configuration",
    );

    let studio = Studio::from_config(&config)?;
    studio
        .ensure_credential()
        .await
        .context("No API key selected")?;

    let generated = tokio::select! {
        result = studio.generate(cli.request()) => result,
        () = shutdown_signal() => {
            studio.shutdown().await;
            anyhow::bail!("Interrupted before the video was ready");
        }
    };

    let artifact = match generated {
        Ok(artifact) => artifact,
        Err(StudioError::Generation(failure)) => {
            eprintln!("{}", failure.message);
            eprintln!("{}", failure.kind.guidance());
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let cwd = std::env::current_dir().context("Cannot resolve current directory")?;
    let path = save_artifact(&artifact, cli.output.as_deref(), &cwd).await?;
    println!("{}", path.display());
    Ok(())
}

/// Resolve on SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C), stopping"),
        () = terminate => tracing::info!("Received SIGTERM, stopping"),
    }
}
