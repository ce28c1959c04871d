//! Maintenance Scheduling Quickstart - Axum Server
//!
//! Run with: cargo run
//! Then open: http://localhost:7860/q/swagger-ui
//!
//! # Environment Variables
//!
//! - `MAINTENANCE_CONFIG`: config file (default: maintenance-scheduling.toml)
//! - `HOST`, `PORT`: bind address overrides
//! - `RUST_LOG`: log filter (default: maintenance_scheduling=info)

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use maintenance_scheduling::api::{self, AppState};
use maintenance_scheduling::config::AppConfig;
use maintenance_scheduling::console;
use maintenance_scheduling::demo_data::generate;
use maintenance_scheduling::engine::LocalSearchEngine;
use maintenance_scheduling::repository::InMemoryRepository;
use maintenance_scheduling::solver::SolverService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("maintenance_scheduling=info".parse()?))
        .init();

    console::print_banner();

    let config = AppConfig::load()?;
    let demo = config.demo_data()?;
    let orchestrator = config.orchestrator_config();

    let seed = || {
        let mut schedule = generate(demo);
        schedule.id = orchestrator.schedule_id;
        schedule
    };
    let repository = match &config.data.snapshot_path {
        Some(path) => InMemoryRepository::open(path, seed)?,
        None => InMemoryRepository::from_schedule(&seed()),
    };
    info!(demo = demo.as_str(), schedule_id = orchestrator.schedule_id, "Repository initialized");

    let engine = LocalSearchEngine::new(config.solver_config());
    let solver = Arc::new(SolverService::new(Arc::new(repository), Arc::new(engine), orchestrator));
    let app = api::router(Arc::new(AppState::new(Arc::clone(&solver))));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    tokio::task::spawn_blocking(move || solver.shutdown()).await?;
    Ok(())
}
