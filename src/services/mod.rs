//! Blocking HTTP clients for the external collaborators: SMS verification,
//! email delivery, and media storage.
//!
//! Each client is a small struct holding endpoint configuration and
//! credentials, constructed once at startup and cloned into
//! `spawn_blocking` closures by handlers. Failures surface as
//! [`ServiceError`] and abort the calling operation; there is no retry
//! policy.

pub mod email;
pub mod media;
pub mod sms;

#[derive(Debug)]
pub enum ServiceError {
    /// Transport-level failure: connection refused, DNS, timeout.
    Transport(String),
    /// The provider answered with an error status or a malformed body.
    Provider(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Transport(msg) => write!(f, "transport error: {msg}"),
            ServiceError::Provider(msg) => write!(f, "provider error: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<ureq::Error> for ServiceError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(code, _) => {
                ServiceError::Provider(format!("unexpected status {code}"))
            }
            other => ServiceError::Transport(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(e: std::io::Error) -> Self {
        ServiceError::Transport(e.to_string())
    }
}
