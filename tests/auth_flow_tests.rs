//! End-to-end tests for the OTP sign-in, session, and profile flows.
//!
//! Each test binds the app on an ephemeral port and drives it over HTTP.
//! External providers (email send, SMS verification, media storage) are
//! stubbed with throwaway axum routers so the full request path is
//! exercised, including outbound calls.

use std::sync::{Arc, Mutex as StdMutex};

use axum::routing::post;
use axum::Router;
use tokio::sync::{oneshot, Mutex};

use parley::auth;
use parley::services::email::EmailClient;
use parley::services::media::MediaClient;
use parley::services::sms::SmsVerifyClient;
use parley::storage::{Storage, UserRow};
use parley::web::router::build_router;
use parley::web::state::{AppState, SharedState};

const SECRET: &str = "test-secret";

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

// ---------------------------------------------------------------------------
// Server and stub plumbing
// ---------------------------------------------------------------------------

async fn serve(app: Router) -> (String, oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = shutdown_rx.await;
    });
    tokio::spawn(async move {
        let _ = server.await;
    });

    (format!("http://{}", addr), shutdown_tx)
}

async fn start_app(
    sms: Option<SmsVerifyClient>,
    email: Option<EmailClient>,
    media: Option<MediaClient>,
) -> (String, SharedState, oneshot::Sender<()>) {
    let storage = Storage::open_in_memory().expect("open storage");
    let state: SharedState = Arc::new(Mutex::new(AppState {
        storage,
        session_secret: SECRET.to_string(),
        sms,
        email,
        media,
    }));
    let (base_url, shutdown_tx) = serve(build_router(Arc::clone(&state))).await;
    (base_url, state, shutdown_tx)
}

/// Requests captured by a stub provider, newest last.
type Captured = Arc<StdMutex<Vec<serde_json::Value>>>;

/// Email provider stub: records every send request body.
async fn start_email_stub() -> (String, Captured, oneshot::Sender<()>) {
    let captured: Captured = Arc::new(StdMutex::new(Vec::new()));
    let app = Router::new().route(
        "/send",
        post({
            let captured = Arc::clone(&captured);
            move |axum::Json(body): axum::Json<serde_json::Value>| {
                let captured = Arc::clone(&captured);
                async move {
                    captured.lock().unwrap().push(body);
                    axum::Json(serde_json::json!({ "id": "stub" }))
                }
            }
        }),
    );
    let (base_url, shutdown_tx) = serve(app).await;
    (format!("{base_url}/send"), captured, shutdown_tx)
}

/// SMS verification stub: accepts any start request and approves checks
/// whose code matches [`GOOD_SMS_CODE`].
const GOOD_SMS_CODE: &str = "424242";

async fn start_sms_stub() -> (String, Captured, oneshot::Sender<()>) {
    let captured: Captured = Arc::new(StdMutex::new(Vec::new()));
    let app = Router::new()
        .route(
            "/v2/Services/{service_id}/Verifications",
            post({
                let captured = Arc::clone(&captured);
                move |axum::Form(form): axum::Form<std::collections::HashMap<String, String>>| {
                    let captured = Arc::clone(&captured);
                    async move {
                        captured
                            .lock()
                            .unwrap()
                            .push(serde_json::json!({ "to": form.get("To") }));
                        axum::Json(serde_json::json!({ "status": "pending" }))
                    }
                }
            }),
        )
        .route(
            "/v2/Services/{service_id}/VerificationCheck",
            post(
                |axum::Form(form): axum::Form<std::collections::HashMap<String, String>>| async move {
                    let status = if form.get("Code").map(String::as_str) == Some(GOOD_SMS_CODE) {
                        "approved"
                    } else {
                        "pending"
                    };
                    axum::Json(serde_json::json!({ "status": status }))
                },
            ),
        );
    let (base_url, shutdown_tx) = serve(app).await;
    (base_url, captured, shutdown_tx)
}

/// Media storage stub: answers every upload with a fixed public URL.
const STUB_MEDIA_URL: &str = "https://cdn.stub.test/media/1.png";

async fn start_media_stub() -> (String, oneshot::Sender<()>) {
    let app = Router::new().route(
        "/upload",
        post(|| async {
            axum::Json(serde_json::json!({ "secure_url": STUB_MEDIA_URL }))
        }),
    );
    let (base_url, shutdown_tx) = serve(app).await;
    (format!("{base_url}/upload"), shutdown_tx)
}

// ---------------------------------------------------------------------------
// Blocking HTTP helpers (run via spawn_blocking)
// ---------------------------------------------------------------------------

fn parse_response(
    result: Result<ureq::Response, ureq::Error>,
) -> (u16, serde_json::Value, Option<String>) {
    let response = match result {
        Ok(r) => r,
        Err(ureq::Error::Status(_, r)) => r,
        Err(e) => panic!("transport error: {e}"),
    };
    let status = response.status();
    let set_cookie = response.header("set-cookie").map(|v| v.to_string());
    let body: serde_json::Value = response.into_json().expect("json body");
    (status, body, set_cookie)
}

fn post_json(
    url: &str,
    body: serde_json::Value,
    cookie: Option<&str>,
) -> (u16, serde_json::Value, Option<String>) {
    let mut request = ureq::post(url).set("Content-Type", "application/json");
    if let Some(c) = cookie {
        request = request.set("Cookie", c);
    }
    parse_response(request.send_string(&body.to_string()))
}

fn get_json(url: &str, cookie: Option<&str>) -> (u16, serde_json::Value, Option<String>) {
    let mut request = ureq::get(url);
    if let Some(c) = cookie {
        request = request.set("Cookie", c);
    }
    parse_response(request.call())
}

/// Hand-rolled multipart body: text fields plus an optional file part.
fn multipart_body(
    boundary: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &[u8])>,
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((name, content_type, data)) = file {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                 filename=\"upload.bin\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

fn send_multipart(
    method: &str,
    url: &str,
    cookie: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &[u8])>,
) -> (u16, serde_json::Value, Option<String>) {
    let boundary = "------parley-test-boundary";
    let body = multipart_body(boundary, fields, file);
    let request = ureq::request(method, url)
        .set(
            "Content-Type",
            &format!("multipart/form-data; boundary={boundary}"),
        )
        .set("Cookie", cookie);
    parse_response(request.send_bytes(&body))
}

/// Pull the 6-digit code out of a captured email body.
fn extract_code(email_body: &serde_json::Value) -> String {
    let text = email_body["text"].as_str().expect("email text");
    text.split_whitespace()
        .map(|w| w.trim_end_matches('.'))
        .find(|w| w.len() == 6 && w.chars().all(|c| c.is_ascii_digit()))
        .expect("code in email")
        .to_string()
}

/// Insert a verified user directly and mint a session cookie for them.
async fn seed_user(state: &SharedState, user_id: &str, username: &str, phone: &str) -> String {
    let now = now_secs();
    let st = state.lock().await;
    st.storage
        .insert_user(&UserRow {
            user_id: user_id.to_string(),
            phone_number: Some(phone.to_string()),
            phone_suffix: Some("1".to_string()),
            username: Some(username.to_string()),
            email: None,
            otp_code: None,
            otp_expires_at: None,
            profile_picture: None,
            about: None,
            last_seen: Some(now),
            is_online: true,
            is_verified: true,
            agreed: true,
            created_at: now,
            updated_at: now,
        })
        .expect("seed user");
    let token = auth::mint_token(user_id, SECRET, now).expect("mint");
    format!("auth_token={token}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn email_otp_sign_in_round_trip() {
    let (email_url, captured, _email_shutdown) = start_email_stub().await;
    let client = EmailClient::new(email_url, "stub-key", "no-reply@test");
    let (base, _state, _shutdown) = start_app(None, Some(client), None).await;

    // Request a code; the email address is normalized to lowercase.
    let (status, body, _) = tokio::task::spawn_blocking({
        let url = format!("{base}/api/auth/send-otp");
        move || post_json(&url, serde_json::json!({ "email": "Alice@Example.COM" }), None)
    })
    .await
    .unwrap();
    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["email"], "alice@example.com");

    let sent = captured.lock().unwrap().last().cloned().expect("email sent");
    assert_eq!(sent["to"], "alice@example.com");
    let code = extract_code(&sent);

    // A wrong code is rejected without mutating anything.
    let (status, body, cookie) = tokio::task::spawn_blocking({
        let url = format!("{base}/api/auth/verify-otp");
        move || {
            post_json(
                &url,
                serde_json::json!({ "email": "alice@example.com", "otp": "000000" }),
                None,
            )
        }
    })
    .await
    .unwrap();
    assert_eq!(status, 400);
    assert_eq!(body["message"], "Invalid or expired OTP");
    assert!(cookie.is_none());

    // The right code verifies, sets the session cookie, and returns the
    // verified user.
    let (status, body, cookie) = tokio::task::spawn_blocking({
        let url = format!("{base}/api/auth/verify-otp");
        let code = code.clone();
        move || {
            post_json(
                &url,
                serde_json::json!({ "email": "alice@example.com", "otp": code }),
                None,
            )
        }
    })
    .await
    .unwrap();
    assert_eq!(status, 200);
    assert_eq!(body["data"]["user"]["isVerified"], true);
    assert!(body["data"]["token"].is_string());
    let cookie = cookie.expect("session cookie");
    assert!(cookie.starts_with("auth_token="));
    let session = cookie.split(';').next().unwrap().to_string();

    // The session authenticates subsequent requests.
    let (status, body, _) = tokio::task::spawn_blocking({
        let url = format!("{base}/api/auth/check-auth");
        let session = session.clone();
        move || get_json(&url, Some(&session))
    })
    .await
    .unwrap();
    assert_eq!(status, 200);
    assert_eq!(body["data"]["user"]["email"], "alice@example.com");
    assert_eq!(body["data"]["user"]["isOnline"], true);

    // The code was cleared on success; replaying it fails.
    let (status, _, _) = tokio::task::spawn_blocking({
        let url = format!("{base}/api/auth/verify-otp");
        move || {
            post_json(
                &url,
                serde_json::json!({ "email": "alice@example.com", "otp": code }),
                None,
            )
        }
    })
    .await
    .unwrap();
    assert_eq!(status, 400);
}

#[tokio::test]
async fn expired_email_code_is_rejected() {
    let (email_url, _captured, _email_shutdown) = start_email_stub().await;
    let client = EmailClient::new(email_url, "stub-key", "no-reply@test");
    let (base, state, _shutdown) = start_app(None, Some(client), None).await;

    let (status, _, _) = tokio::task::spawn_blocking({
        let url = format!("{base}/api/auth/send-otp");
        move || post_json(&url, serde_json::json!({ "email": "bob@test.io" }), None)
    })
    .await
    .unwrap();
    assert_eq!(status, 200);

    // Backdate the stored code's expiry.
    {
        let st = state.lock().await;
        let user = st.storage.find_user_by_email("bob@test.io").unwrap().unwrap();
        st.storage
            .set_otp(&user.user_id, "654321", now_secs() - 1, now_secs())
            .unwrap();
    }

    // Even the correct code fails once expired.
    let (status, body, _) = tokio::task::spawn_blocking({
        let url = format!("{base}/api/auth/verify-otp");
        move || {
            post_json(
                &url,
                serde_json::json!({ "email": "bob@test.io", "otp": "654321" }),
                None,
            )
        }
    })
    .await
    .unwrap();
    assert_eq!(status, 400);
    assert_eq!(body["message"], "Invalid or expired OTP");
}

#[tokio::test]
async fn phone_otp_delegates_to_verification_provider() {
    let (sms_base, captured, _sms_shutdown) = start_sms_stub().await;
    let client = SmsVerifyClient::new(sms_base, "sid", "token", "svc");
    let (base, _state, _shutdown) = start_app(Some(client), None, None).await;

    // Both phone fields are required.
    let (status, body, _) = tokio::task::spawn_blocking({
        let url = format!("{base}/api/auth/send-otp");
        move || post_json(&url, serde_json::json!({ "phoneNumber": "5550001111" }), None)
    })
    .await
    .unwrap();
    assert_eq!(status, 400);
    assert_eq!(body["message"], "Phone number and suffix are required");

    // A valid request starts a verification with the E.164 number; no code
    // is stored locally.
    let (status, body, _) = tokio::task::spawn_blocking({
        let url = format!("{base}/api/auth/send-otp");
        move || {
            post_json(
                &url,
                serde_json::json!({ "phoneNumber": "5550001111", "phoneSuffix": "1" }),
                None,
            )
        }
    })
    .await
    .unwrap();
    assert_eq!(status, 200);
    assert_eq!(body["data"]["phone"], "+15550001111");
    let started = captured.lock().unwrap().last().cloned().expect("start call");
    assert_eq!(started["to"], "+15550001111");

    // The provider rejects a wrong code.
    let (status, _, _) = tokio::task::spawn_blocking({
        let url = format!("{base}/api/auth/verify-otp");
        move || {
            post_json(
                &url,
                serde_json::json!({
                    "phoneNumber": "5550001111",
                    "phoneSuffix": "1",
                    "otp": "111111"
                }),
                None,
            )
        }
    })
    .await
    .unwrap();
    assert_eq!(status, 400);

    // An approved check verifies the user and opens a session.
    let (status, body, cookie) = tokio::task::spawn_blocking({
        let url = format!("{base}/api/auth/verify-otp");
        move || {
            post_json(
                &url,
                serde_json::json!({
                    "phoneNumber": "5550001111",
                    "phoneSuffix": "1",
                    "otp": GOOD_SMS_CODE
                }),
                None,
            )
        }
    })
    .await
    .unwrap();
    assert_eq!(status, 200);
    assert_eq!(body["data"]["user"]["isVerified"], true);
    assert!(cookie.is_some());
}

#[tokio::test]
async fn verify_for_unknown_target_is_not_found() {
    let (base, _state, _shutdown) = start_app(None, None, None).await;

    let (status, body, _) = tokio::task::spawn_blocking({
        let url = format!("{base}/api/auth/verify-otp");
        move || {
            post_json(
                &url,
                serde_json::json!({ "email": "nobody@test.io", "otp": "123456" }),
                None,
            )
        }
    })
    .await
    .unwrap();
    assert_eq!(status, 404);
    assert_eq!(body["message"], "User not found");
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let (base, _state, _shutdown) = start_app(None, None, None).await;

    let (status, body, _) = tokio::task::spawn_blocking({
        let url = format!("{base}/api/auth/check-auth");
        move || get_json(&url, None)
    })
    .await
    .unwrap();
    assert_eq!(status, 401);
    assert_eq!(body["status"], "error");

    // A garbage token is also rejected.
    let (status, _, _) = tokio::task::spawn_blocking({
        let url = format!("{base}/api/auth/check-auth");
        move || get_json(&url, Some("auth_token=not-a-token"))
    })
    .await
    .unwrap();
    assert_eq!(status, 401);
}

#[tokio::test]
async fn logout_clears_the_session_and_presence() {
    let (base, state, _shutdown) = start_app(None, None, None).await;
    let session = seed_user(&state, "u-logout", "Dana", "5550009999").await;

    let (status, _, cookie) = tokio::task::spawn_blocking({
        let url = format!("{base}/api/auth/logout");
        let session = session.clone();
        move || get_json(&url, Some(&session))
    })
    .await
    .unwrap();
    assert_eq!(status, 200);
    let cleared = cookie.expect("clearing cookie");
    assert!(cleared.contains("auth_token="));
    assert!(cleared.contains("Max-Age=0"));

    let st = state.lock().await;
    let user = st.storage.get_user("u-logout").unwrap().unwrap();
    assert!(!user.is_online);
}

#[tokio::test]
async fn profile_update_uploads_picture_and_applies_partial_fields() {
    let (media_url, _media_shutdown) = start_media_stub().await;
    let client = MediaClient::new(media_url, "preset");
    let (base, state, _shutdown) = start_app(None, None, Some(client)).await;
    let session = seed_user(&state, "u-profile", "Temp", "5550002222").await;

    let png = [0x89u8, b'P', b'N', b'G', 0, 1, 2, 3];
    let (status, body, _) = tokio::task::spawn_blocking({
        let url = format!("{base}/api/auth/update-profile");
        let session = session.clone();
        move || {
            send_multipart(
                "PUT",
                &url,
                &session,
                &[("username", "Alice"), ("about", "hey there"), ("agreed", "true")],
                Some(("file", "image/png", &png)),
            )
        }
    })
    .await
    .unwrap();
    assert_eq!(status, 200);
    let user = &body["data"]["user"];
    assert_eq!(user["username"], "Alice");
    assert_eq!(user["about"], "hey there");
    assert_eq!(user["agreed"], true);
    assert_eq!(user["profilePicture"], STUB_MEDIA_URL);

    // A follow-up update with one field leaves the others alone.
    let (status, body, _) = tokio::task::spawn_blocking({
        let url = format!("{base}/api/auth/update-profile");
        let session = session.clone();
        move || send_multipart("PUT", &url, &session, &[("about", "still here")], None)
    })
    .await
    .unwrap();
    assert_eq!(status, 200);
    assert_eq!(body["data"]["user"]["username"], "Alice");
    assert_eq!(body["data"]["user"]["about"], "still here");
    assert_eq!(body["data"]["user"]["profilePicture"], STUB_MEDIA_URL);
}

#[tokio::test]
async fn directory_lists_other_users_with_conversation_state() {
    let (base, state, _shutdown) = start_app(None, None, None).await;
    let alice = seed_user(&state, "u-alice", "Alice", "5550100001").await;
    let _bob = seed_user(&state, "u-bob", "Bob", "5550100002").await;
    let _carol = seed_user(&state, "u-carol", "Carol", "5550100003").await;

    // Alice messages Bob; Carol stays untouched.
    let (status, _, _) = tokio::task::spawn_blocking({
        let url = format!("{base}/api/chat/send-message");
        let alice = alice.clone();
        move || {
            send_multipart(
                "POST",
                &url,
                &alice,
                &[("receiverId", "u-bob"), ("content", "hi bob")],
                None,
            )
        }
    })
    .await
    .unwrap();
    assert_eq!(status, 200);

    let (status, body, _) = tokio::task::spawn_blocking({
        let url = format!("{base}/api/auth/all-users");
        let alice = alice.clone();
        move || get_json(&url, Some(&alice))
    })
    .await
    .unwrap();
    assert_eq!(status, 200);

    let users = body["data"].as_array().expect("user list");
    assert_eq!(users.len(), 2);
    let bob = users
        .iter()
        .find(|u| u["userId"] == "u-bob")
        .expect("bob listed");
    assert_eq!(bob["conversation"]["unreadCount"], 1);
    assert_eq!(bob["conversation"]["latestMessage"]["content"], "hi bob");
    assert_eq!(
        bob["conversation"]["latestMessage"]["sender"]["username"],
        "Alice"
    );
    let carol = users
        .iter()
        .find(|u| u["userId"] == "u-carol")
        .expect("carol listed");
    assert!(carol["conversation"].is_null());
}
