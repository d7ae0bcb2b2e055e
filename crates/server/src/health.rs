use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tender_db::DbPool;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::worker::{SweepStatus, SweepStatusHandle};

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    sweeper: SweepStatusHandle,
}

impl HealthState {
    pub fn new(db_pool: DbPool, sweeper: SweepStatusHandle) -> Self {
        Self { db_pool, sweeper }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub sweeper: HealthCheck,
    pub last_sweep: SweepStatus,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let last_sweep = state.sweeper.read().await.clone();
    let sweeper = sweeper_check(&last_sweep);
    let ready = database.status == "ready" && sweeper.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "tender-server runtime initialized".to_string(),
        },
        database,
        sweeper,
        last_sweep,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

fn sweeper_check(status: &SweepStatus) -> HealthCheck {
    if status.is_healthy() {
        let detail = match status.last_completed_at {
            Some(at) => format!("last sweep completed at {}", at.to_rfc3339()),
            None => "waiting for the first sweep".to_string(),
        };
        return HealthCheck { status: "ready", detail };
    }
    HealthCheck {
        status: "degraded",
        detail: format!(
            "{} consecutive sweep failure(s): {}",
            status.consecutive_failures,
            status.last_error.as_deref().unwrap_or("unknown error")
        ),
    }
}
