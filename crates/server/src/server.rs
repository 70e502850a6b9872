use axum::{
    Router,
    routing::{get, put},
};
use sea_orm::DatabaseConnection;
use tokio::sync::Mutex;

use std::sync::Arc;

use crate::{balance, settings, transactions};

#[derive(Clone)]
pub struct ServerState {
    pub db: DatabaseConnection,
    /// Serializes load, apply and persist of every write so two commands
    /// never work on the same stale rows.
    pub writes: Arc<Mutex<()>>,
}

/// The HTTP application over `db`. The schema must already be migrated.
pub fn app(db: DatabaseConnection) -> Router {
    let state = ServerState {
        db,
        writes: Arc::new(Mutex::new(())),
    };

    Router::new()
        .route(
            "/transactions",
            get(transactions::list).post(transactions::create),
        )
        .route("/transactions/changes", get(transactions::changes))
        .route(
            "/transactions/{id}",
            put(transactions::update).delete(transactions::delete),
        )
        .route(
            "/settings/initial-balance",
            get(settings::get_initial_balance).put(settings::put_initial_balance),
        )
        .route("/balance", get(balance::get_balance))
        .with_state(state)
}

pub async fn run_with_listener(
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(db)).await
}

pub fn spawn_with_listener(
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(db, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
