mod config;
mod errors;
mod models;
mod paper;
mod risk;
mod server;
mod state;

use crate::state::AppState;

#[tokio::main]
async fn main() {
    // Structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("edge_lab starting");

    // Load config
    let cfg = match config::AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    // Size the rayon pool used by grid sweeps and path simulations
    if cfg.sim_threads > 0 {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(cfg.sim_threads)
            .build_global()
        {
            tracing::error!("thread pool error: {e}");
            std::process::exit(1);
        }
    }
    tracing::info!(
        threads = rayon::current_num_threads(),
        max_paths = cfg.max_paths,
        max_steps = cfg.max_steps,
        "simulation pool ready"
    );

    let port = cfg.server_port;
    let app_state = AppState::new(cfg);
    tracing::info!(model = app_state.pricing.name(), "pricing engine ready");

    let app = axum::Router::new()
        .route("/api/defaults", axum::routing::get(server::routes::get_defaults))
        .route("/api/price", axum::routing::post(server::routes::post_price))
        .route("/api/heatmap", axum::routing::post(server::routes::post_heatmap))
        .route("/api/equity", axum::routing::post(server::routes::post_equity))
        .route("/api/counters", axum::routing::get(server::routes::get_counters))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(app_state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("bind error: {e}");
            std::process::exit(1);
        });

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
    }
}
