mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use dearme_api::AppStateInner;
use dearme_crypto::keys::{generate_key, key_to_base64};
use dearme_db::Database;
use dearme_letters::{Dispatcher, DispatcherConfig, run_sweep_loop};
use dearme_mail::{BrevoConfig, BrevoGateway, NotificationGateway, RecordingGateway};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dearme=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {e:#}");
            std::process::exit(1);
        }
    };
    if !config.diary_key_configured {
        warn!(
            suggested = %key_to_base64(&generate_key()),
            "DEARME_DIARY_KEY not set; deriving the diary key from DEARME_JWT_SECRET"
        );
    }

    let db = Arc::new(Database::open(&config.db_path)?);

    let gateway: Arc<dyn NotificationGateway> = match &config.brevo {
        Some(brevo) => {
            let mut settings = BrevoConfig::new(&brevo.api_key, &brevo.sender_email);
            settings.sender_name = brevo.sender_name.clone();
            Arc::new(BrevoGateway::new(settings)?)
        }
        None => {
            warn!("BREVO_API_KEY not set; outgoing email is only recorded in memory");
            Arc::new(RecordingGateway::new())
        }
    };

    let dispatcher = Arc::new(Dispatcher::new(
        db.clone(),
        gateway.clone(),
        DispatcherConfig {
            include_drafts: config.sweep_include_drafts,
            max_attachment_bytes: config.max_attachment_bytes,
            media_root: config.media_root.clone(),
            ..DispatcherConfig::default()
        },
    ));

    tokio::spawn(run_sweep_loop(dispatcher.clone(), config.sweep_interval));
    info!(
        "Sweep loop started (every {}s, drafts included: {})",
        config.sweep_interval.as_secs(),
        config.sweep_include_drafts
    );

    let state = AppStateInner::new(
        db,
        gateway,
        dispatcher,
        config.jwt_secret.clone(),
        config.diary_key,
        &config.public_url,
    );

    let app = dearme_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("DearMe server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
