use axum::{
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hearth_backend_core::{
    app::AppState,
    db,
    handlers::{auth_routes, household_routes, onboarding_routes, user_routes},
    middleware::auth_middleware,
    services::background_tasks,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle version flag for container health checks - must be FIRST
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && args[1] == "--version" {
        println!("hearth-backend v{}", env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "hearth_backend_core=debug,axum=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let state = hearth_backend_core::initialize_app_state().await?;
    let bind_address = state.config.bind_address.clone();
    info!("Starting Hearth backend on {}", bind_address);

    let app = Router::new()
        .route("/api/health", get(health_check))
        // Authentication and onboarding carry their own middleware
        .nest("/api/auth", auth_routes(state.clone()))
        .nest("/api/onboarding", onboarding_routes(state.clone()))
        // Everything else sits behind the request adapter
        .nest("/api", api_routes(state.clone()))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state.clone());

    // Periodic token expiry sweep
    background_tasks::start_token_sweep(state);

    let addr: SocketAddr = bind_address.parse()?;
    info!("Starting HTTP server on {}...", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// Authenticated API surface
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/user", user_routes())
        .nest("/household", household_routes())
        .route_layer(axum_middleware::from_fn_with_state(state, auth_middleware))
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    use serde_json::json;

    let timestamp = chrono::Utc::now().to_rfc3339();

    match db::check_diesel_health(&state.diesel_pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "service": "hearth-backend",
                "timestamp": timestamp
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "error": format!("Database connection failed: {}", e),
                "timestamp": timestamp
            })),
        ),
    }
}
