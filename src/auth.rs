//! Session tokens and the request authorization gate.
//!
//! A session is a signed JWT embedding the user's id, carried in an
//! HTTP-only cookie. Protected routes extract [`AuthUser`]; the extractor
//! verifies the token's signature and expiry and hands the caller's id to
//! the handler, which trusts it without re-validation.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::Response;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::web::state::SharedState;
use crate::web::utils::api_error;

/// Name of the session cookie.
pub const AUTH_COOKIE: &str = "auth_token";

/// Sessions live for a year, matching the cookie lifetime.
pub const SESSION_TTL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// Expiry as a UNIX timestamp.
    pub exp: usize,
}

/// Mint a signed session token for a user, valid for [`SESSION_TTL_SECS`]
/// from `now`.
pub fn mint_token(
    user_id: &str,
    secret: &str,
    now: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + SESSION_TTL_SECS) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verify a session token's signature and expiry; returns the embedded
/// user id.
pub fn verify_token(token: &str, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(decoded.claims.sub)
}

/// Build the long-lived session cookie carrying a freshly minted token.
pub fn session_cookie(token: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(AUTH_COOKIE, token);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookie.set_max_age(Duration::seconds(SESSION_TTL_SECS as i64));
    cookie
}

/// Build an immediately expiring cookie that clears the session.
pub fn clear_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(AUTH_COOKIE, "");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookie.set_max_age(Duration::seconds(0));
    cookie
}

/// The authenticated caller, extracted from the session cookie on
/// protected routes.
pub struct AuthUser {
    pub user_id: String,
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| api_error(StatusCode::UNAUTHORIZED, "Unauthorized: No token provided"))?;

        let token = jar
            .get(AUTH_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or_else(|| {
                api_error(StatusCode::UNAUTHORIZED, "Unauthorized: No token provided")
            })?;

        let secret = {
            let st = state.lock().await;
            st.session_secret.clone()
        };

        let user_id = verify_token(&token, &secret)
            .map_err(|_| api_error(StatusCode::UNAUTHORIZED, "Unauthorized: Invalid token"))?;

        Ok(AuthUser { user_id })
    }
}
