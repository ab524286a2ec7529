//! Shared utility functions for the web layer: the response envelope and
//! JSON projections of stored rows.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::storage::{ConversationRow, MessageRow, Storage, UserRow};

/// Build the standard response envelope: a status tag derived from the HTTP
/// code, a human-readable message, and a data payload.
pub fn api_response(
    status: StatusCode,
    message: impl Into<String>,
    data: serde_json::Value,
) -> Response {
    let tag = if status.as_u16() < 400 {
        "success"
    } else {
        "error"
    };
    let body = serde_json::json!({
        "status": tag,
        "message": message.into(),
        "data": data,
    });
    (status, axum::Json(body)).into_response()
}

/// Error envelope with a null data payload.
pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    api_response(status, message, serde_json::Value::Null)
}

/// Display projection of a user, used when populating message sender /
/// receiver references.
pub fn user_brief_json(user: &UserRow) -> serde_json::Value {
    serde_json::json!({
        "userId": user.user_id,
        "username": user.username,
        "profilePicture": user.profile_picture,
    })
}

/// Public projection of a user: profile and presence, no OTP or consent
/// state. Used by the directory listing.
pub fn user_public_json(user: &UserRow) -> serde_json::Value {
    serde_json::json!({
        "userId": user.user_id,
        "phoneNumber": user.phone_number,
        "phoneSuffix": user.phone_suffix,
        "email": user.email,
        "username": user.username,
        "profilePicture": user.profile_picture,
        "about": user.about,
        "lastSeen": user.last_seen,
        "isOnline": user.is_online,
    })
}

/// Full projection of a user's own record. OTP state never leaves the
/// server.
pub fn user_json(user: &UserRow) -> serde_json::Value {
    serde_json::json!({
        "userId": user.user_id,
        "phoneNumber": user.phone_number,
        "phoneSuffix": user.phone_suffix,
        "email": user.email,
        "username": user.username,
        "profilePicture": user.profile_picture,
        "about": user.about,
        "lastSeen": user.last_seen,
        "isOnline": user.is_online,
        "isVerified": user.is_verified,
        "agreed": user.agreed,
        "createdAt": user.created_at,
        "updatedAt": user.updated_at,
    })
}

/// Build the JSON representation of a message with sender and receiver
/// populated with display info.
pub fn message_to_json(storage: &Storage, m: &MessageRow) -> serde_json::Value {
    let sender = storage.get_user(&m.sender_id).ok().flatten();
    let receiver = storage.get_user(&m.receiver_id).ok().flatten();

    serde_json::json!({
        "messageId": m.message_id,
        "conversationId": m.conversation_id,
        "sender": sender.as_ref().map(user_brief_json),
        "receiver": receiver.as_ref().map(user_brief_json),
        "content": m.content,
        "mediaUrl": m.media_url,
        "contentType": m.content_kind,
        "status": m.status,
        "createdAt": m.created_at,
        "updatedAt": m.updated_at,
    })
}

/// Build the JSON representation of a conversation: participants and the
/// latest message populated with display info.
pub fn conversation_to_json(storage: &Storage, c: &ConversationRow) -> serde_json::Value {
    let participants: Vec<serde_json::Value> = c
        .participants()
        .iter()
        .filter_map(|id| storage.get_user(id).ok().flatten())
        .map(|u| user_brief_json(&u))
        .collect();

    let latest_message = c
        .latest_message_id
        .as_deref()
        .and_then(|id| storage.get_message(id).ok().flatten())
        .map(|m| message_to_json(storage, &m));

    serde_json::json!({
        "conversationId": c.conversation_id,
        "participants": participants,
        "lastMessage": c.last_message,
        "unreadCount": c.unread_count,
        "latestMessage": latest_message,
        "createdAt": c.created_at,
        "updatedAt": c.updated_at,
    })
}

/// Current time as seconds since UNIX epoch.
pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Parse a multipart form boolean the way browsers send them.
pub fn parse_form_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => None,
    }
}
