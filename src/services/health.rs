//! HTTP health endpoints for the bot process: liveness, readiness and a status
//! document covering the job table and the broadcast audience.

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::database::connection::DatabaseManager;
use crate::services::scheduler::JobScheduler;

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: String,
    pub version: String,
    pub checked_at: DateTime<Utc>,
    pub uptime_seconds: i64,
    pub store: StoreStatus,
    pub jobs: Vec<JobStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreStatus {
    pub reachable: bool,
    pub active_reminders: i64,
    pub active_chats: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobStatus {
    pub id: String,
    pub next_fire: Option<DateTime<Utc>>,
}

#[derive(Clone)]
struct HealthState {
    db: Arc<DatabaseManager>,
    scheduler: JobScheduler,
    started_at: DateTime<Utc>,
}

pub struct HealthService {
    pub router: Router,
}

impl HealthService {
    pub fn new(db: Arc<DatabaseManager>, scheduler: JobScheduler) -> Self {
        let state = HealthState {
            db,
            scheduler,
            started_at: Utc::now(),
        };

        let router = Router::new()
            .route("/health", get(status))
            .route("/health/ready", get(ready))
            .route("/health/live", get(|| async { Json("alive") }))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .with_state(state);

        Self { router }
    }
}

/// 200 with `"healthy"` when the store answers, 503 with `"degraded"` otherwise.
/// The job table is reported either way.
async fn status(State(state): State<HealthState>) -> (StatusCode, Json<StatusReport>) {
    let store = store_status(&state.db).await;
    let jobs = state
        .scheduler
        .job_ids()
        .into_iter()
        .map(|id| JobStatus {
            next_fire: state.scheduler.next_fire(&id),
            id,
        })
        .collect();

    let code = if store.reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let now = Utc::now();

    (
        code,
        Json(StatusReport {
            status: if store.reachable { "healthy" } else { "degraded" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            checked_at: now,
            uptime_seconds: (now - state.started_at).num_seconds().max(0),
            store,
            jobs,
        }),
    )
}

async fn ready(State(state): State<HealthState>) -> Result<Json<&'static str>, StatusCode> {
    match count(&state.db, "SELECT 1").await {
        Ok(_) => Ok(Json("ready")),
        Err(e) => {
            tracing::warn!("Readiness check failed: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

async fn store_status(db: &DatabaseManager) -> StoreStatus {
    let reminders = count(db, "SELECT COUNT(*) FROM reminders WHERE active = 1").await;
    let chats = count(db, "SELECT COUNT(*) FROM chats WHERE is_active = 1").await;

    match (reminders, chats) {
        (Ok(active_reminders), Ok(active_chats)) => StoreStatus {
            reachable: true,
            active_reminders,
            active_chats,
        },
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!("Health check could not query the store: {}", e);
            StoreStatus {
                reachable: false,
                active_reminders: 0,
                active_chats: 0,
            }
        }
    }
}

async fn count(db: &DatabaseManager, sql: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(sql).fetch_one(&db.pool).await
}
