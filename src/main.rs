use std::sync::Arc;

use tokio::sync::watch;

use ledgerwatch::config::AppConfig;
use ledgerwatch::db;
use ledgerwatch::engine::clock::SystemClock;
use ledgerwatch::engine::orchestrator::Orchestrator;
use ledgerwatch::engine::scheduler::AlertScheduler;
use ledgerwatch::http::{self, AppState};
use ledgerwatch::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    logging::init();

    let cfg = AppConfig::load(&AppConfig::default_path())?;
    let pool = db::init_db(&cfg.resolve_data_dir())?;

    let orchestrator = Arc::new(Orchestrator::new(pool.clone(), cfg.clone()));
    let scheduler = Arc::new(AlertScheduler::new(
        pool.clone(),
        cfg.scheduler.clone(),
        orchestrator,
        Arc::new(SystemClock),
    ));

    if cfg.scheduler.enabled && cfg.scheduler.autostart {
        scheduler.start(None);
    }

    let state = Arc::new(AppState {
        pool,
        scheduler: scheduler.clone(),
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(http::serve(state, cfg.http.port, shutdown_rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    scheduler.stop();
    let _ = shutdown_tx.send(true);
    server.await??;

    Ok(())
}
