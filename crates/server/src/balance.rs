use api_types::balance::{BalanceOnDate, BalanceQuery};
use axum::{
    Json,
    extract::{Query, State},
};

use crate::{ServerError, server::ServerState, store};

/// Balance on `date` over every stored record, from the stored initial
/// balance if any.
pub async fn get_balance(
    State(state): State<ServerState>,
    Query(query): Query<BalanceQuery>,
) -> Result<Json<BalanceOnDate>, ServerError> {
    let records = store::load_all(&state.db).await?;
    let initial = store::initial_balance(&state.db).await?;
    Ok(Json(engine::compute_balance_on_date(
        &records.transactions,
        query.date.trim(),
        initial.as_ref(),
    )))
}
