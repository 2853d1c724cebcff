use anyhow::Result;
use blockmeter::Config;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(config.log_level.into())
                .from_env_lossy(),
        )
        .init();

    let app = config.build().await?;
    let cancellation_token = CancellationToken::new();

    let mut app_future = Box::pin(app.run(cancellation_token.clone()));

    tokio::select! {
        result = &mut app_future => {
            handle_app_result(result);
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C signal, initiating graceful shutdown");
            cancellation_token.cancel();
            handle_app_result(app_future.await);
        }
    }

    Ok(())
}

/// Handle the result of the application
fn handle_app_result(result: Result<()>) {
    match result {
        Ok(()) => tracing::info!("Server shutdown gracefully"),
        Err(e) => {
            tracing::error!("Server encountered an error: {}", e);
        }
    }
}
