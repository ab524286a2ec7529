//! Profile update and user directory handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum_extra::extract::Multipart;

use crate::auth::AuthUser;
use crate::plog;
use crate::web::state::SharedState;
use crate::web::utils::{
    api_error, api_response, conversation_to_json, now_secs, parse_form_bool, user_json,
    user_public_json,
};

/// Multipart fields accepted by the profile update route.
#[derive(Default)]
struct ProfileForm {
    username: Option<String>,
    about: Option<String>,
    agreed: Option<bool>,
    profile_picture: Option<String>,
    file: Option<(Vec<u8>, String)>,
}

async fn read_profile_form(mut multipart: Multipart) -> Result<ProfileForm, Response> {
    let mut form = ProfileForm::default();

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
            "username" | "about" | "agreed" | "profilePicture" => {
                let value = field.text().await.map_err(|e| {
                    api_error(StatusCode::BAD_REQUEST, format!("Failed to read field: {e}"))
                })?;
                let value = value.trim().to_string();
                if value.is_empty() {
                    continue;
                }
                match name.as_str() {
                    "username" => form.username = Some(value),
                    "about" => form.about = Some(value),
                    "agreed" => form.agreed = parse_form_bool(&value),
                    _ => form.profile_picture = Some(value),
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

pub async fn update_profile_handler(
    State(state): State<SharedState>,
    auth: AuthUser,
    multipart: Multipart,
) -> Response {
    let mut form = match read_profile_form(multipart).await {
        Ok(f) => f,
        Err(response) => return response,
    };

    // An uploaded file wins over a directly supplied picture URL.
    if let Some((data, content_type)) = form.file.take() {
        let client = {
            let st = state.lock().await;
            st.media.clone()
        };
        let Some(client) = client else {
            return api_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "Media uploads are not configured",
            );
        };

        let upload_result =
            tokio::task::spawn_blocking(move || client.upload(&data, &content_type)).await;
        match upload_result {
            Ok(Ok(url)) => form.profile_picture = Some(url),
            Ok(Err(e)) => {
                plog!("profile: picture upload failed: {e}");
                return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
            }
            Err(e) => {
                plog!("profile: upload task failed: {e}");
                return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
            }
        }
    }

    let now = now_secs();
    let st = state.lock().await;
    if let Err(e) = st.storage.update_profile(
        &auth.user_id,
        form.username.as_deref(),
        form.about.as_deref(),
        form.agreed,
        form.profile_picture.as_deref(),
        now,
    ) {
        plog!("profile: update failed: {e}");
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
    }

    match st.storage.get_user(&auth.user_id) {
        Ok(Some(user)) => {
            plog!(
                "profile: updated {}",
                crate::logging::user_id(&auth.user_id)
            );
            api_response(
                StatusCode::OK,
                "Profile updated successfully",
                serde_json::json!({ "user": user_json(&user) }),
            )
        }
        Ok(None) => api_error(StatusCode::NOT_FOUND, "User not found"),
        Err(e) => {
            plog!("profile: reload failed: {e}");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// Every user except the caller, annotated with the caller's conversation
/// with that user (or null) including its latest message.
pub async fn list_users_handler(State(state): State<SharedState>, auth: AuthUser) -> Response {
    let st = state.lock().await;

    let users = match st.storage.list_users_except(&auth.user_id) {
        Ok(users) => users,
        Err(e) => {
            plog!("directory: listing failed: {e}");
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    let json: Vec<serde_json::Value> = users
        .iter()
        .map(|user| {
            let conversation = st
                .storage
                .conversation_between(&auth.user_id, &user.user_id)
                .ok()
                .flatten()
                .map(|c| conversation_to_json(&st.storage, &c));

            let mut entry = user_public_json(user);
            entry["conversation"] = conversation.unwrap_or(serde_json::Value::Null);
            entry
        })
        .collect();

    api_response(
        StatusCode::OK,
        "Users fetched successfully",
        serde_json::json!(json),
    )
}
