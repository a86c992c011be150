use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use notes_api::config::Config;
use notes_api::dev::DispatchLog;
use notes_api::google::GoogleVerifier;
use notes_api::mail::{HttpMailer, HttpMailerOptions, LogMailer, Mailer};
use notes_api::otp::OtpService;
use notes_api::token::TokenIssuer;
use notes_api::{AppState, AppStateInner};

/// Bound on each outbound call to the mail API or Google's key endpoint.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notes=debug,notes_api=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(notes_db::Database::open(&PathBuf::from(&config.db_path))?);

    // Collaborators
    let mailer: Arc<dyn Mailer> = match &config.mail_api_url {
        Some(endpoint) => {
            info!("Sending mail through {}", endpoint);
            Arc::new(HttpMailer::new(HttpMailerOptions {
                endpoint: endpoint.clone(),
                api_key: config.mail_api_key.clone(),
                timeout: UPSTREAM_TIMEOUT,
            })?)
        }
        None => {
            warn!("NOTES_MAIL_API_URL not set, OTP emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    if config.google_client_id.is_none() {
        warn!("NOTES_GOOGLE_CLIENT_ID not set, Google sign-in is disabled");
    }

    let dispatch_log = config.dev_endpoints.then(|| Arc::new(DispatchLog::new()));

    let mut otp = OtpService::new(db.clone(), mailer, config.mail_from.clone(), config.otp_expiry_minutes);
    if let Some(log) = &dispatch_log {
        otp = otp.with_dispatch_log(log.clone());
    }

    let state: AppState = Arc::new(AppStateInner {
        db,
        otp,
        tokens: TokenIssuer::new(&config.jwt_secret, config.jwt_ttl_days),
        identity: Arc::new(GoogleVerifier::new(config.google_client_id.clone(), UPSTREAM_TIMEOUT)?),
        dispatch_log,
    });

    let app = notes_api::router(state, &config.frontend_url)?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Notes server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
