use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;
use sea_orm::DbErr;

use api_types::ErrorBody;
pub use server::{app, run_with_listener, spawn_with_listener};

mod balance;
mod server;
mod settings;
pub mod store;
mod transactions;

pub mod types {
    pub mod transaction {
        pub use api_types::transaction::{
            ChangesQuery, ScopeQuery, Touched, TransactionNew, TransactionRecord,
            TransactionUpdate,
        };
    }

    pub mod settings {
        pub use api_types::settings::InitialBalance;
    }

    pub mod balance {
        pub use api_types::balance::{BalanceOnDate, BalanceQuery};
    }
}

#[derive(Debug)]
pub enum ServerError {
    Engine(EngineError),
    Database(DbErr),
    Generic(String),
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), err.to_string()),
            ServerError::Database(err) => {
                tracing::error!("database error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(ErrorBody { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

impl From<DbErr> for ServerError {
    fn from(value: DbErr) -> Self {
        Self::Database(value)
    }
}
