use anyhow::{Context, Result};
use axum::serve;
use std::time::Instant;
use tour_planner::common::config::PlannerConfig;
use tour_planner::loading::geojson::{LoadOptions, load_graph_from_path};
use tour_planner::loading::shared::SharedGraph;
use tour_planner::routing::external::ExternalRoutingClient;
use tour_planner::routing::planner::TourPlanner;
use tour_planner::server::router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tour_planner=info".parse()?),
        )
        .init();

    let config = PlannerConfig::from_env();

    // A broken path network stops the server from starting at all
    let now = Instant::now();
    let options = LoadOptions::from(&config);
    let graph = load_graph_from_path(&config.geodata_path, &options)
        .with_context(|| {
            format!(
                "Error loading path network from {}",
                config.geodata_path.display()
            )
        })?;
    tracing::info!("Path network ready in {:.2?}", now.elapsed());

    let directions = ExternalRoutingClient::from_config(&config)
        .context("Error creating directions client")?;
    let planner = TourPlanner::new(SharedGraph::preloaded(graph), directions);

    let app = router(planner);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Error binding to {}", config.bind_addr))?;
    tracing::info!("Listening on {}", config.bind_addr);

    serve(listener, app).await.context("Error serving API")?;

    Ok(())
}
