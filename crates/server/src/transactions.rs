//! Transactions API endpoints

use api_types::transaction::{
    ChangesQuery, DeleteQuery, ScopeQuery, Touched, TransactionNew, TransactionRecord,
    TransactionUpdate,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use engine::{
    Command, CreateCmd, DeleteCmd, EngineError, Scope, SyncStatus, Transaction, Transition,
    UpdateCmd, calendar,
};

use crate::{ServerError, server::ServerState, store};

pub async fn list(
    State(state): State<ServerState>,
) -> Result<Json<Vec<TransactionRecord>>, ServerError> {
    let live = store::list_live(&state.db).await?;
    Ok(Json(live.into_iter().map(TransactionRecord::from).collect()))
}

pub async fn changes(
    State(state): State<ServerState>,
    Query(query): Query<ChangesQuery>,
) -> Result<Json<Vec<TransactionRecord>>, ServerError> {
    let changed = store::changes_since(&state.db, query.since).await?;
    Ok(Json(
        changed
            .into_iter()
            .map(|change| TransactionRecord {
                changed_at: change.changed_at,
                ..change.transaction.into()
            })
            .collect(),
    ))
}

/// Replica push: the record exactly as the client holds it.
fn replica(payload: &TransactionNew, now: DateTime<Utc>) -> Result<Transaction, ServerError> {
    let Some(id) = payload.id.clone() else {
        return Err(ServerError::Generic(
            "id is required when expandSeries is false".to_string(),
        ));
    };
    payload.draft().validate()?;

    let date = payload.date.trim().to_string();
    Ok(Transaction {
        id,
        month: calendar::month_of(&date),
        date,
        kind: payload.kind,
        item: payload.item.trim().to_string(),
        category: payload.category.clone(),
        amount: payload.amount,
        is_fixed: payload.is_fixed,
        plan_id: payload.plan_id.clone(),
        updated_at: payload.updated_at.unwrap_or(now),
        deleted: payload.deleted,
        sync_status: SyncStatus::Synced,
    })
}

/// Whole-record last-writer-wins write of a replica. When the stored row is
/// newer the record is dropped and the stored row restamped, so the pusher
/// pulls it back. Returns the row as stored and the ids written.
async fn write_replica(
    state: &ServerState,
    current: &engine::State,
    record: Transaction,
) -> Result<(Transaction, Vec<String>), ServerError> {
    if let Some(stored) = current.get(&record.id)
        && stored.updated_at > record.updated_at
    {
        tracing::debug!(id = %record.id, "stale replica ignored");
        store::mark_changed(&state.db, &record.id).await?;
        return Ok((stored.clone(), Vec::new()));
    }

    let Transition { state: next, applied } =
        engine::apply(current, Command::Upsert(record), Utc::now())?;
    store::persist(&state.db, &next, &applied.touched).await?;
    let stored = next
        .get(&applied.id)
        .cloned()
        .ok_or_else(|| EngineError::NotFound(applied.id.clone()))?;
    Ok((stored, applied.touched))
}

/// Loads `id` for a replica write that must find an existing row.
async fn stored_row(state: &ServerState, id: &str) -> Result<(engine::State, Transaction), ServerError> {
    let current = store::load_scope(&state.db, Some(id), None).await?;
    let stored = current
        .get(id)
        .cloned()
        .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
    Ok((current, stored))
}

pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<TransactionNew>,
) -> Result<(StatusCode, Json<TransactionRecord>), ServerError> {
    let now = Utc::now();
    let _writes = state.writes.lock().await;

    if !payload.expand_series {
        let record = replica(&payload, now)?;
        let current = store::load_scope(&state.db, Some(&record.id), None).await?;
        let (stored, _) = write_replica(&state, &current, record).await?;
        return Ok((StatusCode::CREATED, Json(stored.into())));
    }

    let current = store::load_scope(&state.db, None, payload.plan_id.as_deref()).await?;
    let mut cmd = CreateCmd::new(payload.draft());
    if let Some(end_month) = &payload.end_month {
        cmd = cmd.end_month(end_month);
    }

    let Transition { state: next, applied } = engine::apply(&current, cmd.into(), now)?;
    store::persist(&state.db, &next, &applied.touched).await?;
    tracing::debug!(id = %applied.id, touched = applied.touched.len(), "transaction created");

    let created = next
        .get(&applied.id)
        .cloned()
        .ok_or_else(|| EngineError::NotFound(applied.id.clone()))?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Query(query): Query<ScopeQuery>,
    Json(payload): Json<TransactionUpdate>,
) -> Result<Json<Touched>, ServerError> {
    let _writes = state.writes.lock().await;

    if let Some(stamp) = payload.updated_at {
        let patch = payload.patch();
        patch.validate()?;
        let (current, mut record) = stored_row(&state, &id).await?;
        patch.apply_to(&mut record);
        if let Some(deleted) = payload.deleted {
            record.deleted = deleted;
        }
        record.updated_at = stamp;
        let (_, touched) = write_replica(&state, &current, record).await?;
        tracing::debug!(%id, touched = touched.len(), "replica update");
        return Ok(Json(Touched { touched }));
    }

    let scope = Scope::parse_or_default(query.scope.as_deref());
    let current = store::load_scope(&state.db, Some(&id), None).await?;
    let mut cmd = UpdateCmd::new(id, payload.patch()).scope(scope);
    if let Some(end_month) = &payload.fixed_end_month {
        cmd = cmd.fixed_end_month(end_month);
    }

    let Transition { state: next, applied } = engine::apply(&current, cmd.into(), Utc::now())?;
    store::persist(&state.db, &next, &applied.touched).await?;
    tracing::debug!(id = %applied.id, %scope, touched = applied.touched.len(), "transaction updated");

    Ok(Json(Touched {
        touched: applied.touched,
    }))
}

pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> Result<StatusCode, ServerError> {
    let _writes = state.writes.lock().await;

    if let Some(stamp) = query.updated_at {
        let (current, mut tombstone) = stored_row(&state, &id).await?;
        tombstone.deleted = true;
        tombstone.updated_at = stamp;
        let (_, touched) = write_replica(&state, &current, tombstone).await?;
        tracing::debug!(%id, touched = touched.len(), "replica delete");
        return Ok(StatusCode::NO_CONTENT);
    }

    let scope = Scope::parse_or_default(query.scope.as_deref());
    let current = store::load_scope(&state.db, Some(&id), None).await?;
    let cmd = DeleteCmd::new(id).scope(scope);
    let Transition { state: next, applied } = engine::apply(&current, cmd.into(), Utc::now())?;
    store::persist(&state.db, &next, &applied.touched).await?;
    tracing::debug!(id = %applied.id, %scope, touched = applied.touched.len(), "transaction deleted");

    Ok(StatusCode::NO_CONTENT)
}
