//! Message sending, listing, read-receipt, and deletion handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum_extra::extract::Multipart;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::plog;
use crate::storage::{ContentKind, MessageRow, MessageStatus};
use crate::web::config::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::web::state::SharedState;
use crate::web::utils::{api_error, api_response, message_to_json, now_secs};

// -- Send message --

/// Multipart fields accepted by the send route.
#[derive(Default)]
struct SendForm {
    sender_id: Option<String>,
    receiver_id: Option<String>,
    content: Option<String>,
    file: Option<(Vec<u8>, String)>,
}

async fn read_send_form(mut multipart: Multipart) -> Result<SendForm, Response> {
    let mut form = SendForm::default();

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let content_type = field
                    .content_type()
                    .map(|ct| ct.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let bytes = field.bytes().await.map_err(|e| {
                    api_error(StatusCode::BAD_REQUEST, format!("Failed to read file: {e}"))
                })?;
                if !bytes.is_empty() {
                    form.file = Some((bytes.to_vec(), content_type));
                }
            }
            "senderId" | "receiverId" | "content" => {
                let value = field.text().await.map_err(|e| {
                    api_error(StatusCode::BAD_REQUEST, format!("Failed to read field: {e}"))
                })?;
                let value = value.trim().to_string();
                if value.is_empty() {
                    continue;
                }
                match name.as_str() {
                    "senderId" => form.sender_id = Some(value),
                    "receiverId" => form.receiver_id = Some(value),
                    _ => form.content = Some(value),
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

pub async fn send_message_handler(
    State(state): State<SharedState>,
    auth: AuthUser,
    multipart: Multipart,
) -> Response {
    let form = match read_send_form(multipart).await {
        Ok(f) => f,
        Err(response) => return response,
    };

    let Some(receiver_id) = form.receiver_id else {
        return api_error(StatusCode::BAD_REQUEST, "Receiver is required");
    };

    // The sender field, when present, must name the authenticated caller.
    let sender_id = form.sender_id.unwrap_or_else(|| auth.user_id.clone());
    if sender_id != auth.user_id {
        return api_error(
            StatusCode::FORBIDDEN,
            "Sender does not match authenticated user",
        );
    }

    let now = now_secs();

    // Short lock: resolve the receiver and the conversation. The
    // conversation is created before the message body is validated; a
    // later validation or upload failure leaves it in place.
    let (conversation, media_client) = {
        let st = state.lock().await;

        match st.storage.get_user(&receiver_id) {
            Ok(Some(_)) => {}
            Ok(None) => return api_error(StatusCode::NOT_FOUND, "Receiver not found"),
            Err(e) => {
                plog!("send: receiver lookup failed: {e}");
                return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
            }
        }

        let candidate_id = Uuid::new_v4().to_string();
        let conversation = match st.storage.find_or_create_conversation(
            &sender_id,
            &receiver_id,
            &candidate_id,
            now,
        ) {
            Ok(c) => c,
            Err(e) => {
                plog!("send: conversation resolution failed: {e}");
                return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
            }
        };

        (conversation, st.media.clone())
    };
    // Lock released

    // Classify the body: a file wins over text and fixes the content kind.
    let (kind, content, media_url) = if let Some((data, content_type)) = form.file {
        let Some(kind) = ContentKind::from_mime(&content_type) else {
            return api_error(StatusCode::BAD_REQUEST, "Unsupported file type");
        };
        let Some(client) = media_client else {
            return api_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "Media uploads are not configured",
            );
        };

        let upload_result =
            tokio::task::spawn_blocking(move || client.upload(&data, &content_type)).await;
        let url = match upload_result {
            Ok(Ok(url)) => url,
            Ok(Err(e)) => {
                plog!("send: media upload failed: {e}");
                return api_error(StatusCode::BAD_REQUEST, "File upload failed");
            }
            Err(e) => {
                plog!("send: upload task failed: {e}");
                return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
            }
        };
        (kind, None, Some(url))
    } else if let Some(content) = form.content {
        (ContentKind::Text, Some(content), None)
    } else {
        return api_error(
            StatusCode::BAD_REQUEST,
            "Message content or file is required",
        );
    };

    // Short lock: persist the message and update the conversation.
    let message_id = Uuid::new_v4().to_string();
    let json = {
        let st = state.lock().await;

        let row = MessageRow {
            message_id: message_id.clone(),
            conversation_id: conversation.conversation_id.clone(),
            sender_id: sender_id.clone(),
            receiver_id: receiver_id.clone(),
            content: content.clone(),
            media_url,
            content_kind: kind.as_str().to_string(),
            status: MessageStatus::Sent.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        if let Err(e) = st.storage.insert_message(&row) {
            plog!("send: message insert failed: {e}");
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }

        if let Err(e) = st.storage.record_message_sent(
            &conversation.conversation_id,
            content.as_deref(),
            &message_id,
            now,
        ) {
            plog!("send: conversation update failed: {e}");
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }

        message_to_json(&st.storage, &row)
    };

    plog!(
        "send: {} -> {} ({}, kind={})",
        crate::logging::user_id(&sender_id),
        crate::logging::user_id(&receiver_id),
        crate::logging::msg_id(&message_id),
        kind.as_str()
    );

    api_response(StatusCode::OK, "Message sent successfully", json)
}

// -- List messages --

#[derive(Deserialize)]
pub struct ListMessagesQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

pub async fn list_messages_handler(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(conversation_id): Path<String>,
    Query(params): Query<ListMessagesQuery>,
) -> Response {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT);
    let page = params.page.unwrap_or(1).max(1);
    let offset = (page - 1) * limit;
    let now = now_secs();

    let st = state.lock().await;

    let conversation = match st.storage.get_conversation(&conversation_id) {
        Ok(Some(c)) => c,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "Conversation not found"),
        Err(e) => {
            plog!("messages: conversation lookup failed: {e}");
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    if !conversation.has_participant(&auth.user_id) {
        return api_error(StatusCode::FORBIDDEN, "Access denied to this conversation");
    }

    let messages = match st.storage.list_messages(&conversation_id, offset, limit) {
        Ok(m) => m,
        Err(e) => {
            plog!("messages: listing failed: {e}");
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    let json: Vec<serde_json::Value> = messages
        .iter()
        .map(|m| message_to_json(&st.storage, m))
        .collect();

    // Read-receipt sweep: fetching a conversation marks everything
    // addressed to the caller as read and clears the unread counter.
    if let Err(e) = st
        .storage
        .mark_conversation_read(&conversation_id, &auth.user_id, now)
    {
        plog!("messages: read sweep failed: {e}");
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
    }
    if let Err(e) = st.storage.reset_unread(&conversation_id, now) {
        plog!("messages: unread reset failed: {e}");
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
    }

    api_response(
        StatusCode::OK,
        "Messages fetched successfully",
        serde_json::json!(json),
    )
}

// -- Read receipts --

pub async fn mark_read_handler(
    State(state): State<SharedState>,
    auth: AuthUser,
    axum::Json(message_ids): axum::Json<Vec<String>>,
) -> Response {
    let st = state.lock().await;
    match st
        .storage
        .mark_messages_read(&message_ids, &auth.user_id, now_secs())
    {
        Ok(updated) => api_response(
            StatusCode::OK,
            "Messages marked as read",
            serde_json::json!({ "updated": updated }),
        ),
        Err(e) => {
            plog!("read: bulk update failed: {e}");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

// -- Delete --

pub async fn delete_message_handler(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(message_id): Path<String>,
) -> Response {
    let st = state.lock().await;

    let message = match st.storage.get_message(&message_id) {
        Ok(Some(m)) => m,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "Message not found"),
        Err(e) => {
            plog!("delete: message lookup failed: {e}");
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    if message.sender_id != auth.user_id {
        return api_error(
            StatusCode::FORBIDDEN,
            "You can only delete your own messages",
        );
    }

    match st.storage.delete_message(&message_id) {
        Ok(_) => {
            plog!("delete: {}", crate::logging::msg_id(&message_id));
            api_response(
                StatusCode::OK,
                "Message deleted successfully",
                serde_json::Value::Null,
            )
        }
        Err(e) => {
            plog!("delete: removal failed: {e}");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}
