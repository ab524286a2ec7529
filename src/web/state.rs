//! Shared application state.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::services::email::EmailClient;
use crate::services::media::MediaClient;
use crate::services::sms::SmsVerifyClient;
use crate::storage::Storage;

/// Process-wide state: the storage handle, the session signing secret, and
/// the external service clients (each `None` when its provider is not
/// configured). Handlers clone clients out of the lock before doing
/// blocking I/O.
pub struct AppState {
    pub storage: Storage,
    pub session_secret: String,
    pub sms: Option<SmsVerifyClient>,
    pub email: Option<EmailClient>,
    pub media: Option<MediaClient>,
}

pub type SharedState = Arc<Mutex<AppState>>;
