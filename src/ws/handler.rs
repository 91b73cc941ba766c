use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::auth::session;
use crate::state::AppState;
use crate::ws::actor;

/// GET /ws
/// WebSocket upgrade endpoint. Authenticates via the signed session cookie
/// BEFORE accepting the upgrade: a failed check refuses the handshake with
/// 401, so no unauthenticated frame is ever dispatched and no connection
/// state is created for rejected clients.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok());

    match session::verify_session(
        &state.db,
        &state.session_secret,
        &state.session_cookie,
        cookie_header,
    )
    .await
    {
        Ok(user_id) => {
            tracing::info!(user_id = %user_id, "WebSocket connection authenticated");
            ws.on_upgrade(move |socket| actor::run_connection(socket, state, user_id))
        }
        Err(rejection) => {
            tracing::warn!(reason = %rejection, "WebSocket upgrade refused");
            (StatusCode::UNAUTHORIZED, "unauthorized").into_response()
        }
    }
}
