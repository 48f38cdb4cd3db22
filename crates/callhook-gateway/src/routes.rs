//! Route handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::event::parse_created_event;
use crate::server::AppState;

type Reply = (StatusCode, Json<Value>);

fn error_reply(status: StatusCode, error: impl ToString) -> Reply {
    (status, Json(json!({"ok": false, "error": error.to_string()})))
}

/// Health check endpoint.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "callhook",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Document-created trigger for the notifications collection.
///
/// Always 200 once the event parses: skips and failed deliveries are
/// outcomes, and a non-2xx would make the trigger service redeliver.
pub async fn notification_created(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Reply {
    let record = match parse_created_event(&body) {
        Ok(record) => record,
        Err(e) => return error_reply(StatusCode::BAD_REQUEST, e),
    };

    let expected = &state.dispatcher.config().collection;
    if &record.reference.collection != expected {
        return error_reply(
            StatusCode::BAD_REQUEST,
            format!(
                "Event is for '{}', this route handles '{expected}'",
                record.reference.collection
            ),
        );
    }

    let outcome = state.dispatcher.handle(&record).await;
    (
        StatusCode::OK,
        Json(json!({
            "ok": true,
            "document": record.reference.path(),
            "result": outcome,
        })),
    )
}

/// Run one sweep now. Scheduler jobs call this on their cron.
pub async fn run_sweep(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Reply {
    if state.reapers.policy(&name).is_none() {
        return error_reply(StatusCode::NOT_FOUND, format!("No retention policy named '{name}'"));
    }

    match state.reapers.run_once(&name, Utc::now()).await {
        Ok(report) => (StatusCode::OK, Json(json!({"ok": true, "report": report}))),
        Err(e) => {
            tracing::error!("❌ Sweep '{name}' failed: {e}");
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// Policies and recent sweep history.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let policies: Vec<Value> = state
        .reapers
        .policies()
        .iter()
        .map(|p| {
            json!({
                "name": p.name,
                "collection": p.collection,
                "max_age_secs": p.max_age.num_seconds(),
                "interval_secs": p.interval.as_secs(),
                "limit": p.limit,
            })
        })
        .collect();

    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "notifications_collection": state.dispatcher.config().collection,
        "policies": policies,
        "history": state.reapers.history().await,
    }))
}
