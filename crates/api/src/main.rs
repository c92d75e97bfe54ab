use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;

use jobboard_api::app::{AppState, build_app};
use jobboard_api::config::{Config, Environment};
use jobboard_infra::workers::SignOnTokenPurgeWorker;
use jobboard_infra::{PostgresUserRepository, UserRepository, db};
use jobboard_observability::LogFormat;
use jobboard_templates::Templates;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env = Environment::from_name(&std::env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
    jobboard_observability::init(if env.is_dev() { LogFormat::Pretty } else { LogFormat::Json });

    let config = Config::load().context("invalid configuration")?;

    let templates = Templates::load(&config.template_dir, config.env.is_dev())
        .with_context(|| format!("failed to load templates from {}", config.template_dir.display()))?;

    let pool = db::connect(&config.database_url, 10)
        .await
        .context("failed to connect to postgres")?;
    db::apply_schema(&pool).await.context("failed to apply schema")?;
    let users: Arc<dyn UserRepository> = Arc::new(PostgresUserRepository::new(pool));

    let purge = config
        .purge_interval
        .map(|every| SignOnTokenPurgeWorker::spawn(users.clone(), every));

    let state = AppState::new(&config, templates, users).context("invalid identity provider key")?;
    let app = build_app(state);

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(env = ?config.env, "listening on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(worker) = purge {
        worker.shutdown().await;
    }
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("received Ctrl+C, shutting down"),
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
