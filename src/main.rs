//! # Referral Bot
//!
//! Loads configuration, opens the store, restores every scheduled job and
//! then runs the Telegram dispatcher next to the health server until
//! Ctrl-C.

use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use referral_bot::bot::handlers::BotHandler;
use referral_bot::bot::BotContext;
use referral_bot::config::Config;
use referral_bot::database::connection::DatabaseManager;
use referral_bot::services::announcement::AnnouncementService;
use referral_bot::services::broadcast::{BroadcastPolicy, Broadcaster};
use referral_bot::services::delivery::TelegramChannel;
use referral_bot::services::health::HealthService;
use referral_bot::services::reminder::ReminderService;
use referral_bot::services::scheduler::JobScheduler;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "referral_bot=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Builds the broadcaster and both job owners, then re-registers their jobs.
async fn start_jobs(
    config: &Config,
    bot: &Bot,
    db: &Arc<DatabaseManager>,
    scheduler: &JobScheduler,
) -> Result<(ReminderService, AnnouncementService)> {
    let broadcaster = Arc::new(Broadcaster::new(
        Arc::new(TelegramChannel::new(bot.clone())),
        db.clone(),
        BroadcastPolicy {
            max_attempts: config.broadcast_retry_count,
            retry_delay: config.broadcast_retry_delay,
            ..BroadcastPolicy::default()
        },
        config.admin_ids.clone(),
        config.approved_chat_ids.clone(),
    ));

    let reminders = ReminderService::new(
        db.clone(),
        scheduler.clone(),
        broadcaster.clone(),
        config.timezone,
        config.upload_dir.clone(),
    );
    let restored = reminders.restore_reminders().await.context("restoring reminders")?;
    info!(
        "Reminders: {} scheduled, {} expired, {} skipped",
        restored.scheduled, restored.expired, restored.skipped
    );

    let announcements = AnnouncementService::new(
        db.clone(),
        scheduler.clone(),
        broadcaster,
        config.timezone,
        config.announcement_days.clone(),
        config.announcement_time,
        config.referral_terms,
    );
    match announcements.refresh_job().await.context("scheduling announcements")? {
        Some(next) => info!("Next referral announcement at {}", next),
        None => info!("Referral announcements are disabled"),
    }

    Ok((reminders, announcements))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let config = Arc::new(Config::from_env()?);
    info!(
        "Referral Bot v{} - database {}, port {}, timezone {}",
        env!("CARGO_PKG_VERSION"),
        config.database_url,
        config.http_port,
        config.timezone
    );

    let db = DatabaseManager::new(&config.database_url).await?;
    db.run_migrations().await.context("running migrations")?;
    let db = Arc::new(db);

    std::fs::create_dir_all(&config.upload_dir)
        .with_context(|| format!("creating upload dir {}", config.upload_dir.display()))?;

    let bot = Bot::new(&config.telegram_bot_token);
    let scheduler = JobScheduler::new();
    scheduler.start().await?;

    let (reminders, announcements) = start_jobs(&config, &bot, &db, &scheduler).await?;

    let handler = BotHandler::new(BotContext {
        db: db.clone(),
        config: config.clone(),
        reminders,
        announcements,
    });

    let health_service = HealthService::new(db.clone(), scheduler.clone());
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port))
        .await
        .with_context(|| format!("binding health port {}", config.http_port))?;

    let mut dispatcher = tokio::spawn(async move {
        Dispatcher::builder(bot, handler.schema())
            .default_handler(|update| async move {
                tracing::trace!("Unhandled update: {:?}", update.kind);
            })
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    });
    let mut health = tokio::spawn(async move { axum::serve(listener, health_service.router).await });

    tokio::select! {
        joined = &mut dispatcher => {
            if let Err(e) = joined {
                tracing::error!("Dispatcher task failed: {}", e);
            }
            health.abort();
        }
        joined = &mut health => {
            match joined {
                Ok(Err(e)) => tracing::error!("Health server stopped: {}", e),
                Err(e) => tracing::error!("Health task failed: {}", e),
                Ok(Ok(())) => {}
            }
            dispatcher.abort();
        }
    }

    if let Err(e) = scheduler.stop().await {
        tracing::warn!("Error stopping scheduler: {}", e);
    }
    info!("Referral Bot stopped");
    Ok(())
}
