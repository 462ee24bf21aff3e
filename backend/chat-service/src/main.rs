use std::sync::Arc;
use uuid::Uuid;

use chat_service::{
    config::Config,
    db, error, logging, migrations,
    redis_client::RedisClient,
    routes,
    services::ChatService,
    state::AppState,
    store::PostgresChatStore,
    websocket::{pubsub, ConnectionRegistry},
};

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(Config::from_env()?);

    let pool = db::init_pool(&cfg.database_url)
        .await
        .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;

    // Schema must be in sync before the service binds; a migration failure
    // is fatal.
    migrations::run_all(&pool)
        .await
        .map_err(|e| error::AppError::StartServer(format!("database migrations failed: {e}")))?;

    let redis = RedisClient::from_url(&cfg.redis_url)
        .await
        .map_err(|e| error::AppError::StartServer(format!("redis: {e}")))?;

    let registry = ConnectionRegistry::new();
    let node_id = Uuid::new_v4();
    let publisher = pubsub::EventPublisher::new(redis.manager(), node_id);

    let store = Arc::new(PostgresChatStore::new(pool));
    let chat = Arc::new(ChatService::new(
        store,
        &cfg,
        registry.clone(),
        Some(publisher),
    ));

    // Cross-node fanout: events published by other nodes re-enter the local
    // registry through this listener.
    let listener_client = redis.client().clone();
    let listener_registry = registry.clone();
    tokio::spawn(async move {
        if let Err(e) = pubsub::start_psub_listener(listener_client, listener_registry, node_id).await {
            tracing::error!(error = %e, "redis pub/sub listener exited");
        }
    });

    let state = AppState {
        chat,
        config: cfg.clone(),
    };
    let app = routes::router(state);

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| error::AppError::StartServer(format!("bind {bind_addr}: {e}")))?;
    tracing::info!(%bind_addr, %node_id, "starting chat-service");

    axum::serve(listener, app)
        .await
        .map_err(|e| error::AppError::StartServer(e.to_string()))?;

    Ok(())
}
