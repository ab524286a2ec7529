//! Axum router construction.

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::web::config::MAX_UPLOAD_SIZE;
use crate::web::handlers;
use crate::web::state::SharedState;

/// Build the complete Axum router with all API routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        // Health
        .route("/api/health", get(handlers::health::health_handler))
        // Auth API
        .route("/api/auth/send-otp", post(handlers::auth::send_otp_handler))
        .route(
            "/api/auth/verify-otp",
            post(handlers::auth::verify_otp_handler),
        )
        .route("/api/auth/logout", get(handlers::auth::logout_handler))
        .route(
            "/api/auth/update-profile",
            put(handlers::users::update_profile_handler)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE as usize + 4096)),
        )
        .route(
            "/api/auth/check-auth",
            get(handlers::auth::check_auth_handler),
        )
        .route(
            "/api/auth/all-users",
            get(handlers::users::list_users_handler),
        )
        // Chat API
        .route(
            "/api/chat/send-message",
            post(handlers::messages::send_message_handler)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE as usize + 4096)),
        )
        .route(
            "/api/chat/conversations",
            get(handlers::conversations::list_conversations_handler),
        )
        .route(
            "/api/chat/conversations/{conversation_id}/messages",
            get(handlers::messages::list_messages_handler),
        )
        .route(
            "/api/chat/messages/read",
            put(handlers::messages::mark_read_handler),
        )
        .route(
            "/api/chat/messages/{message_id}",
            delete(handlers::messages::delete_message_handler),
        )
        .with_state(state)
}
