//! Conversation listing handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;

use crate::auth::AuthUser;
use crate::plog;
use crate::web::state::SharedState;
use crate::web::utils::{api_error, api_response, conversation_to_json};

/// The caller's conversations, most recently active first, with the latest
/// message populated.
pub async fn list_conversations_handler(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> Response {
    let st = state.lock().await;
    match st.storage.list_conversations_for(&auth.user_id) {
        Ok(conversations) => {
            let json: Vec<serde_json::Value> = conversations
                .iter()
                .map(|c| conversation_to_json(&st.storage, c))
                .collect();
            api_response(
                StatusCode::OK,
                "Conversations fetched successfully",
                serde_json::json!(json),
            )
        }
        Err(e) => {
            plog!("conversations: listing failed: {e}");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}
