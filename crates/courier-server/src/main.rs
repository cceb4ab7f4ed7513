mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use courier_api::middleware::require_send_secret;
use courier_api::{AppState, AppStateInner, health, send, session};
use courier_client::SidecarFactory;
use courier_db::Database;
use courier_gateway::{Dispatcher, connection};
use courier_session::{ControllerConfig, LifecycleController};

use crate::config::Config;

#[derive(Clone)]
struct WsState {
    dispatcher: Dispatcher,
    db: Arc<Database>,
    session_id: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier=debug,tower_http=debug".into()),
        )
        .init();

    // Config — missing mandatory values abort startup
    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);

    // Shared state
    let dispatcher = Dispatcher::new();
    let factory = Arc::new(SidecarFactory::new(
        config.client_url.clone(),
        config.session_id.clone(),
        config.auth_dir.clone(),
    ));
    let (controller, handle) = LifecycleController::new(
        db.clone(),
        dispatcher.clone(),
        factory,
        ControllerConfig::new(config.session_id.clone()),
    );
    controller.spawn();

    let state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        session: handle,
        send_secret: config.send_secret.clone(),
        session_id: config.session_id.clone(),
    });

    // Routes
    let send_route = Router::new()
        .route("/send", post(send::send_message))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_send_secret,
        ))
        .with_state(state.clone());

    let read_routes = Router::new()
        .route("/session/{id}/qr", get(session::get_qr))
        .route("/session/{id}/status", get(session::get_status))
        .route("/health", get(health::health))
        .with_state(state);

    let ws_route = Router::new().route("/ws", get(ws_upgrade)).with_state(WsState {
        dispatcher,
        db,
        session_id: config.session_id.clone(),
    });

    let app = Router::new()
        .merge(send_route)
        .merge(read_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Courier relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<WsState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_observer(socket, state.dispatcher, state.db, state.session_id)
    })
}
