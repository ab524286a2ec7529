//! OTP sign-in, session, and logout handlers.
//!
//! Two sign-in channels with deliberately different code ownership: the
//! phone path delegates code generation and checking entirely to the SMS
//! verification provider, while the email path generates and stores a
//! short-lived code locally and only delegates delivery.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use rand::Rng;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{self, clear_session_cookie, session_cookie, AuthUser, AUTH_COOKIE};
use crate::plog;
use crate::services::sms::{self, APPROVED};
use crate::storage::UserRow;
use crate::web::config::OTP_TTL_SECS;
use crate::web::state::SharedState;
use crate::web::utils::{api_error, api_response, now_secs, user_json};

/// Generate a 6-digit one-time code for the email channel.
fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// -- Send OTP --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpRequest {
    phone_number: Option<String>,
    phone_suffix: Option<String>,
    email: Option<String>,
}

pub async fn send_otp_handler(
    State(state): State<SharedState>,
    axum::Json(req): axum::Json<SendOtpRequest>,
) -> Response {
    if let Some(email) = non_empty(&req.email) {
        send_email_otp(&state, &email.to_ascii_lowercase()).await
    } else {
        send_phone_otp(&state, non_empty(&req.phone_number), non_empty(&req.phone_suffix)).await
    }
}

async fn send_email_otp(state: &SharedState, email: &str) -> Response {
    let now = now_secs();
    let code = generate_otp();

    // Short lock: look up or lazily create the user, store the code.
    let (user_id, client) = {
        let st = state.lock().await;

        let user = match st.storage.find_user_by_email(email) {
            Ok(u) => u,
            Err(e) => {
                plog!("otp: user lookup failed: {e}");
                return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
            }
        };

        let user_id = match user {
            Some(u) => u.user_id,
            None => {
                let id = Uuid::new_v4().to_string();
                let row = new_user(&id, None, None, Some(email), now);
                if let Err(e) = st.storage.insert_user(&row) {
                    plog!("otp: user creation failed: {e}");
                    return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
                }
                id
            }
        };

        if let Err(e) = st.storage.set_otp(&user_id, &code, now + OTP_TTL_SECS, now) {
            plog!("otp: storing code failed: {e}");
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }

        (user_id, st.email.clone())
    };
    // Lock released

    let Some(client) = client else {
        return api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Email sign-in is not configured",
        );
    };

    let send_result = tokio::task::spawn_blocking({
        let email = email.to_string();
        let code = code.clone();
        move || client.send_otp(&email, &code)
    })
    .await;

    match send_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            plog!("otp: email delivery failed: {e}");
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
        Err(e) => {
            plog!("otp: email delivery task failed: {e}");
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    }

    plog!("otp: emailed code to {}", crate::logging::user_id(&user_id));
    api_response(
        StatusCode::OK,
        "OTP sent successfully",
        serde_json::json!({ "email": email }),
    )
}

async fn send_phone_otp(
    state: &SharedState,
    phone_number: Option<&str>,
    phone_suffix: Option<&str>,
) -> Response {
    let (Some(number), Some(suffix)) = (phone_number, phone_suffix) else {
        return api_error(
            StatusCode::BAD_REQUEST,
            "Phone number and suffix are required",
        );
    };

    let now = now_secs();

    // Short lock: look up or lazily create the user. No code is stored
    // locally; the verification provider owns the code lifecycle.
    let (user_id, client) = {
        let st = state.lock().await;

        let user = match st.storage.find_user_by_phone(number) {
            Ok(u) => u,
            Err(e) => {
                plog!("otp: user lookup failed: {e}");
                return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
            }
        };

        let user_id = match user {
            Some(u) => u.user_id,
            None => {
                let id = Uuid::new_v4().to_string();
                let row = new_user(&id, Some(number), Some(suffix), None, now);
                if let Err(e) = st.storage.insert_user(&row) {
                    plog!("otp: user creation failed: {e}");
                    return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
                }
                id
            }
        };

        (user_id, st.sms.clone())
    };
    // Lock released

    let Some(client) = client else {
        return api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Phone sign-in is not configured",
        );
    };

    let phone = format!("{suffix}{number}");
    let start_result = tokio::task::spawn_blocking({
        let phone = phone.clone();
        move || client.start_verification(&phone)
    })
    .await;

    match start_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            plog!("otp: verification start failed: {e}");
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
        Err(e) => {
            plog!("otp: verification start task failed: {e}");
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    }

    plog!(
        "otp: started sms verification for {}",
        crate::logging::user_id(&user_id)
    );
    api_response(
        StatusCode::OK,
        "OTP sent successfully",
        serde_json::json!({ "phone": sms::format_e164(&phone) }),
    )
}

fn new_user(
    id: &str,
    phone_number: Option<&str>,
    phone_suffix: Option<&str>,
    email: Option<&str>,
    now: u64,
) -> UserRow {
    UserRow {
        user_id: id.to_string(),
        phone_number: phone_number.map(|v| v.to_string()),
        phone_suffix: phone_suffix.map(|v| v.to_string()),
        username: None,
        email: email.map(|v| v.to_string()),
        otp_code: None,
        otp_expires_at: None,
        profile_picture: None,
        about: None,
        last_seen: None,
        is_online: false,
        is_verified: false,
        agreed: false,
        created_at: now,
        updated_at: now,
    }
}

// -- Verify OTP --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    phone_number: Option<String>,
    phone_suffix: Option<String>,
    email: Option<String>,
    otp: String,
}

pub async fn verify_otp_handler(
    State(state): State<SharedState>,
    jar: CookieJar,
    axum::Json(req): axum::Json<VerifyOtpRequest>,
) -> Response {
    let now = now_secs();

    // Resolve the target user and check the code; no state is mutated on
    // a failed check.
    let user_id = if let Some(email) = non_empty(&req.email) {
        let email = email.to_ascii_lowercase();
        let st = state.lock().await;
        let user = match st.storage.find_user_by_email(&email) {
            Ok(Some(u)) => u,
            Ok(None) => return api_error(StatusCode::NOT_FOUND, "User not found"),
            Err(e) => {
                plog!("otp: user lookup failed: {e}");
                return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
            }
        };

        let code_matches = user.otp_code.as_deref() == Some(req.otp.trim());
        let not_expired = user.otp_expires_at.map(|exp| exp >= now).unwrap_or(false);
        if !code_matches || !not_expired {
            return api_error(StatusCode::BAD_REQUEST, "Invalid or expired OTP");
        }
        user.user_id
    } else {
        let (Some(number), Some(suffix)) =
            (non_empty(&req.phone_number), non_empty(&req.phone_suffix))
        else {
            return api_error(
                StatusCode::BAD_REQUEST,
                "Phone number and suffix are required",
            );
        };

        let (user_id, client) = {
            let st = state.lock().await;
            let user = match st.storage.find_user_by_phone(number) {
                Ok(Some(u)) => u,
                Ok(None) => return api_error(StatusCode::NOT_FOUND, "User not found"),
                Err(e) => {
                    plog!("otp: user lookup failed: {e}");
                    return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
                }
            };
            (user.user_id, st.sms.clone())
        };

        let Some(client) = client else {
            return api_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "Phone sign-in is not configured",
            );
        };

        let phone = format!("{suffix}{number}");
        let otp = req.otp.trim().to_string();
        let check_result =
            tokio::task::spawn_blocking(move || client.check_verification(&phone, &otp)).await;

        let status = match check_result {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                plog!("otp: verification check failed: {e}");
                return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
            }
            Err(e) => {
                plog!("otp: verification check task failed: {e}");
                return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
            }
        };

        if status != APPROVED {
            return api_error(StatusCode::BAD_REQUEST, "Invalid or expired OTP");
        }
        user_id
    };

    // Success: flip the verified flag, clear OTP state, mint a session.
    let (user, token) = {
        let st = state.lock().await;
        if let Err(e) = st.storage.mark_verified(&user_id, now) {
            plog!("otp: marking verified failed: {e}");
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
        let user = match st.storage.get_user(&user_id) {
            Ok(Some(u)) => u,
            Ok(None) => return api_error(StatusCode::NOT_FOUND, "User not found"),
            Err(e) => {
                plog!("otp: user reload failed: {e}");
                return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
            }
        };
        let token = match auth::mint_token(&user_id, &st.session_secret, now) {
            Ok(t) => t,
            Err(e) => {
                plog!("otp: session mint failed: {e}");
                return api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
            }
        };
        (user, token)
    };

    plog!("otp: verified {}", crate::logging::user_id(&user_id));

    let jar = jar.add(session_cookie(token.clone()));
    let body = api_response(
        StatusCode::OK,
        "OTP verified successfully",
        serde_json::json!({ "user": user_json(&user), "token": token }),
    );
    (jar, body).into_response()
}

// -- Session --

pub async fn logout_handler(State(state): State<SharedState>, jar: CookieJar) -> Response {
    // Best-effort presence update when a valid session is attached.
    if let Some(cookie) = jar.get(AUTH_COOKIE) {
        let token = cookie.value().to_string();
        let st = state.lock().await;
        if let Ok(user_id) = auth::verify_token(&token, &st.session_secret) {
            let _ = st.storage.set_online(&user_id, false, now_secs());
        }
    }

    let jar = jar.add(clear_session_cookie());
    let body = api_response(
        StatusCode::OK,
        "Logged out successfully",
        serde_json::Value::Null,
    );
    (jar, body).into_response()
}

pub async fn check_auth_handler(State(state): State<SharedState>, auth: AuthUser) -> Response {
    let st = state.lock().await;
    match st.storage.get_user(&auth.user_id) {
        Ok(Some(user)) => api_response(
            StatusCode::OK,
            "Authenticated",
            serde_json::json!({ "user": user_json(&user) }),
        ),
        Ok(None) => api_error(StatusCode::NOT_FOUND, "User not found"),
        Err(e) => {
            plog!("auth: user lookup failed: {e}");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}
