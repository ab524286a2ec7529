//! Health check endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::web::state::SharedState;

pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let st = state.lock().await;
    let user_count = st.storage.count_users().unwrap_or(0);
    let message_count = st.storage.count_messages().unwrap_or(0);

    let body = serde_json::json!({
        "status": "ok",
        "users": user_count,
        "messages": message_count,
        "providers": {
            "sms": st.sms.is_some(),
            "email": st.email.is_some(),
            "media": st.media.is_some(),
        },
    });
    (StatusCode::OK, axum::Json(body))
}
