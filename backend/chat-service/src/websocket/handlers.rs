use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::metrics::WS_CONNECTIONS;
use crate::middleware::auth::{verify_token, AuthUser};
use crate::state::AppState;
use crate::websocket::ChatEvent;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub conversation_id: Uuid,
    /// Browsers cannot set headers on WebSocket upgrades, so the token may
    /// ride in the query string instead of the Authorization header.
    pub token: Option<String>,
}

fn token_from(params: &WsParams, headers: &HeaderMap) -> Option<String> {
    params.token.clone().or_else(|| {
        headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(str::to_string)
    })
}

/// GET /ws?conversation_id= — live subscription to one conversation.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let Some(token) = token_from(&params, &headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let user = match verify_token(&token, &state.config.jwt_secret) {
        Ok(user) => user,
        Err(_) => return StatusCode::UNAUTHORIZED.into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(state, params.conversation_id, user, socket))
}

async fn handle_socket(state: AppState, conversation_id: Uuid, user: AuthUser, mut socket: WebSocket) {
    // Membership gate plus subscription. The facade registers the live
    // receiver before reading the backlog, so nothing published in between
    // is lost.
    let (backlog, mut rx) = match state.chat.subscribe(conversation_id, user.id).await {
        Ok(subscription) => subscription,
        Err(e) => {
            if !matches!(e, AppError::Forbidden | AppError::NotFound(_)) {
                tracing::error!(error = %e, %conversation_id, user_id = %user.id, "subscribe failed");
            }
            let _ = socket.send(WsMessage::Close(None)).await;
            return;
        }
    };

    WS_CONNECTIONS.inc();
    tracing::info!(%conversation_id, user_id = %user.id, "websocket subscribed");

    let (mut sender, mut receiver) = socket.split();

    for message in backlog {
        let event = ChatEvent::MessageNew { message };
        if send_event(&mut sender, &event).await.is_err() {
            WS_CONNECTIONS.dec();
            return;
        }
    }

    loop {
        tokio::select! {
            maybe = rx.recv() => {
                match maybe {
                    Some(event) => {
                        if send_event(&mut sender, &event).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    // Pings are answered by the framework; inbound text is
                    // ignored, mutations go through the HTTP API.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    // Dropping rx detaches the subscription; the registry prunes the closed
    // channel on the next broadcast.
    WS_CONNECTIONS.dec();
    tracing::debug!(%conversation_id, user_id = %user.id, "websocket closed");
}

async fn send_event<S>(sender: &mut S, event: &ChatEvent) -> Result<(), ()>
where
    S: SinkExt<WsMessage> + Unpin,
{
    let payload = match serde_json::to_string(event) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(error = %e, event_type = event.event_type(), "failed to serialize event");
            return Ok(());
        }
    };
    sender
        .send(WsMessage::Text(payload))
        .await
        .map_err(|_| ())
}
