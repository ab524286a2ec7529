//! parley web server: REST API for OTP sign-in, profiles, and messaging,
//! persisting state in SQLite.

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod utils;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::Mutex;

use crate::plog;
use crate::services::email::EmailClient;
use crate::services::media::MediaClient;
use crate::services::sms::SmsVerifyClient;
use crate::storage::{db_path, Storage};

use config::{Cli, Config};
use state::{AppState, SharedState};

/// Entry point: parse CLI, open storage, start server.
pub async fn run() {
    let cli = Cli::parse();
    let config = Config::from_cli_and_env(cli);

    crate::logging::init();

    plog!("parley starting");
    plog!("  data directory: {}", config.data_dir.display());

    let database = db_path(&config.data_dir);
    let storage = Storage::open(&database).expect("failed to open database");
    plog!("  database: {}", database.display());

    let sms = config.sms.as_ref().map(|c| {
        SmsVerifyClient::new(
            c.base_url.clone(),
            c.account_sid.clone(),
            c.auth_token.clone(),
            c.service_id.clone(),
        )
    });
    let email = config.email.as_ref().map(|c| {
        EmailClient::new(c.api_url.clone(), c.api_key.clone(), c.from_address.clone())
    });
    let media = config
        .media
        .as_ref()
        .map(|c| MediaClient::new(c.upload_url.clone(), c.upload_preset.clone()));

    plog!(
        "  providers: sms={} email={} media={}",
        if sms.is_some() { "configured" } else { "none" },
        if email.is_some() { "configured" } else { "none" },
        if media.is_some() { "configured" } else { "none" },
    );

    let state: SharedState = Arc::new(Mutex::new(AppState {
        storage,
        session_secret: config.session_secret.clone(),
        sms,
        email,
        media,
    }));

    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind");
    plog!("parley listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await.expect("server error");
}
