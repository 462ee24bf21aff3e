use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod conversations;
pub mod messages;
pub mod reactions;
pub mod unread;

use crate::metrics::{metrics_handler, track_http_metrics};
use crate::middleware::auth::auth_middleware;
use crate::state::AppState;
use crate::websocket::handlers::ws_handler;
use conversations::{create_direct, create_group, get_conversation, list_conversations, mark_read};
use messages::{get_message_history, send_message};
use reactions::toggle_reaction;
use unread::total_unread;

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "service": "chat-service" }))
}

async fn openapi_json() -> Json<serde_json::Value> {
    use utoipa::OpenApi;
    Json(serde_json::to_value(crate::openapi::ApiDoc::openapi()).unwrap_or_else(|_| json!({})))
}

// Minimal Swagger UI page pointed at /openapi.json
async fn docs() -> axum::response::Html<&'static str> {
    axum::response::Html(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Dadspace Chat Service API</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script>
        window.onload = function() {
            SwaggerUIBundle({
                url: "/openapi.json",
                dom_id: '#swagger-ui',
                deepLinking: true
            });
        };
    </script>
</body>
</html>"#,
    )
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/conversations", get(list_conversations))
        .route("/conversations/direct", post(create_direct))
        .route("/conversations/group", post(create_group))
        .route("/conversations/:id", get(get_conversation))
        .route("/conversations/:id/read", post(mark_read))
        .route(
            "/conversations/:id/messages",
            get(get_message_history).post(send_message),
        )
        .route("/messages/:id/reactions", post(toggle_reaction))
        .route("/unread/total", get(total_unread))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(docs))
        // The WS route authenticates inside the handler: browsers cannot set
        // headers on upgrades, so the token may arrive as a query parameter.
        .route("/ws", get(ws_handler))
        .nest("/api/v1", api)
        .layer(middleware::from_fn(track_http_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
