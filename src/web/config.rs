//! Configuration types and constants for the parley server.

use std::path::PathBuf;

use clap::Parser;

/// Email OTP codes expire after five minutes.
pub(crate) const OTP_TTL_SECS: u64 = 5 * 60;

/// Default and maximum page size for message listing.
pub(crate) const DEFAULT_PAGE_LIMIT: u32 = 50;
pub(crate) const MAX_PAGE_LIMIT: u32 = 200;

/// Maximum file size accepted on multipart routes (profile pictures and
/// message media).
pub(crate) const MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024; // 10 MiB

/// Messaging server for the parley chat application.
///
/// Provides OTP sign-in over SMS or email, cookie sessions, a user
/// directory, and conversation/message CRUD, persisting state in SQLite.
///
/// Configuration can be set via CLI arguments or environment variables.
/// CLI arguments take precedence over environment variables.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about)]
pub struct Cli {
    /// HTTP server bind address [env: PARLEY_BIND] [default: 127.0.0.1:8000]
    #[arg(long, short = 'b')]
    pub bind: Option<String>,

    /// Data directory for the database [env: PARLEY_DATA_DIR] [default: ~/.parley]
    #[arg(long, short = 'd')]
    pub data_dir: Option<PathBuf>,

    /// Secret used to sign session tokens [env: PARLEY_SESSION_SECRET]
    #[arg(long)]
    pub session_secret: Option<String>,
}

/// SMS verification provider credentials. Absent when not configured;
/// phone sign-in is then unavailable.
pub struct SmsProviderConfig {
    pub base_url: String,
    pub account_sid: String,
    pub auth_token: String,
    pub service_id: String,
}

/// Email send API credentials. Absent when not configured; email sign-in
/// is then unavailable.
pub struct EmailProviderConfig {
    pub api_url: String,
    pub api_key: String,
    pub from_address: String,
}

/// Media storage API settings. Absent when not configured; file uploads
/// are then unavailable.
pub struct MediaProviderConfig {
    pub upload_url: String,
    pub upload_preset: String,
}

pub struct Config {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub session_secret: String,
    pub sms: Option<SmsProviderConfig>,
    pub email: Option<EmailProviderConfig>,
    pub media: Option<MediaProviderConfig>,
}

const DEFAULT_SMS_BASE_URL: &str = "https://verify.twilio.com";

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_cli_and_env(cli: Cli) -> Self {
        let data_dir = cli
            .data_dir
            .or_else(|| env_var("PARLEY_DATA_DIR").map(PathBuf::from))
            .unwrap_or_else(|| {
                std::env::var("HOME")
                    .map(|h| PathBuf::from(h).join(".parley"))
                    .unwrap_or_else(|_| PathBuf::from(".parley"))
            });

        let bind_addr = cli
            .bind
            .or_else(|| env_var("PARLEY_BIND"))
            .unwrap_or_else(|| "127.0.0.1:8000".to_string());

        let session_secret = cli
            .session_secret
            .or_else(|| env_var("PARLEY_SESSION_SECRET"))
            .expect("PARLEY_SESSION_SECRET must be set");

        let sms = match (
            env_var("TWILIO_ACCOUNT_SID"),
            env_var("TWILIO_AUTH_TOKEN"),
            env_var("TWILIO_VERIFY_SERVICE_ID"),
        ) {
            (Some(account_sid), Some(auth_token), Some(service_id)) => Some(SmsProviderConfig {
                base_url: env_var("TWILIO_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_SMS_BASE_URL.to_string()),
                account_sid,
                auth_token,
                service_id,
            }),
            _ => None,
        };

        let email = env_var("EMAIL_API_URL").map(|api_url| EmailProviderConfig {
            api_url,
            api_key: env_var("EMAIL_API_KEY").unwrap_or_default(),
            from_address: env_var("EMAIL_FROM")
                .unwrap_or_else(|| "no-reply@parley.local".to_string()),
        });

        let media = env_var("MEDIA_UPLOAD_URL").map(|upload_url| MediaProviderConfig {
            upload_url,
            upload_preset: env_var("MEDIA_UPLOAD_PRESET").unwrap_or_default(),
        });

        Self {
            bind_addr,
            data_dir,
            session_secret,
            sms,
            email,
            media,
        }
    }
}
