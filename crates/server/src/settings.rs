//! Initial balance setting

use api_types::settings::InitialBalance;
use axum::{Json, extract::State};
use engine::{EngineError, calendar};

use crate::{ServerError, server::ServerState, store};

pub async fn get_initial_balance(
    State(state): State<ServerState>,
) -> Result<Json<InitialBalance>, ServerError> {
    store::initial_balance(&state.db)
        .await?
        .map(Json)
        .ok_or_else(|| EngineError::NotFound("initial balance".to_string()).into())
}

/// Replaces the baseline. The amount may be negative (an overdrawn start).
pub async fn put_initial_balance(
    State(state): State<ServerState>,
    Json(payload): Json<InitialBalance>,
) -> Result<Json<InitialBalance>, ServerError> {
    let date = payload.date.trim();
    if calendar::parse_date(date).is_none() {
        return Err(EngineError::Validation(format!("invalid date: {}", payload.date)).into());
    }
    let value = InitialBalance {
        amount: payload.amount,
        date: date.to_string(),
    };

    store::set_initial_balance(&state.db, &value).await?;
    tracing::info!(amount = %value.amount, date = %value.date, "initial balance set");
    Ok(Json(value))
}
