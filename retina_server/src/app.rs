use crate::config::Config;
use crate::server::HttpServer;
use crate::upload::UploadHandler;

use retina_models::{InferenceService, ModelRegistry};
use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let models_config = config.models.clone();
    let registry = match tokio::task::spawn_blocking(move || ModelRegistry::load(&models_config))
        .await?
    {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            tracing::error!("Failed to load model registry: {}", e);
            return Err(Box::new(e));
        }
    };

    let inference_service = InferenceService::new(registry, config.models.image_size);
    let upload_handler = match UploadHandler::new(inference_service, &config.uploads) {
        Ok(handler) => handler,
        Err(e) => {
            tracing::error!(
                "Failed to prepare upload directory {:?}: {}",
                config.uploads.upload_dir,
                e
            );
            return Err(Box::new(e));
        }
    };

    let server = HttpServer::new(upload_handler, &config.server).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_shutdown_rx = shutdown_tx.subscribe();

    let server_handle = server.run(server_shutdown_rx).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    if let Ok(Err(e)) = server_handle.await {
        tracing::error!("Server exited with error: {}", e);
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
