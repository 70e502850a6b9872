//! HTTP access to the tally server.

use api_types::{
    ErrorBody,
    settings::InitialBalance,
    transaction::{ChangesQuery, DeleteQuery, TransactionNew, TransactionRecord, TransactionUpdate},
};
use chrono::{DateTime, Utc};
use engine::{Changes, RemoteError, RemoteStore, Transaction};
use reqwest::{Response, StatusCode, Url};

use crate::error::{AppError, Result};

fn transport(err: reqwest::Error) -> RemoteError {
    RemoteError::Network(err.to_string())
}

/// Passes successful responses through and turns the others into
/// [`RemoteError`]s, reading the server's `{error}` body when there is one.
async fn check(res: Response) -> std::result::Result<Response, RemoteError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound);
    }

    let message = res
        .json::<ErrorBody>()
        .await
        .map(|err| err.error)
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(RemoteError::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// The server as a [`RemoteStore`].
#[derive(Debug, Clone)]
pub struct HttpRemote {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpRemote {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|err| {
            AppError::Server(RemoteError::Network(format!("invalid base_url: {err}")))
        })?;
        Ok(Self {
            base_url,
            http: reqwest::Client::new(),
        })
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, RemoteError> {
        self.base_url
            .join(path)
            .map_err(|err| RemoteError::Network(format!("invalid base_url: {err}")))
    }

    /// `None` when the server has no initial balance yet.
    pub async fn initial_balance(&self) -> std::result::Result<Option<InitialBalance>, RemoteError> {
        let res = self
            .http
            .get(self.endpoint("settings/initial-balance")?)
            .send()
            .await
            .map_err(transport)?;
        match check(res).await {
            Ok(res) => res.json().await.map(Some).map_err(transport),
            Err(RemoteError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn set_initial_balance(
        &self,
        value: &InitialBalance,
    ) -> std::result::Result<InitialBalance, RemoteError> {
        let res = self
            .http
            .put(self.endpoint("settings/initial-balance")?)
            .json(value)
            .send()
            .await
            .map_err(transport)?;
        check(res).await?.json().await.map_err(transport)
    }
}

impl RemoteStore for HttpRemote {
    async fn update(&self, record: &Transaction) -> std::result::Result<(), RemoteError> {
        let res = self
            .http
            .put(self.endpoint(&format!("transactions/{}", record.id))?)
            .json(&TransactionUpdate::replica(record))
            .send()
            .await
            .map_err(transport)?;
        check(res).await?;
        Ok(())
    }

    async fn create(&self, record: &Transaction) -> std::result::Result<(), RemoteError> {
        let res = self
            .http
            .post(self.endpoint("transactions")?)
            .json(&TransactionNew::replica(record))
            .send()
            .await
            .map_err(transport)?;
        check(res).await?;
        Ok(())
    }

    async fn delete(&self, tombstone: &Transaction) -> std::result::Result<(), RemoteError> {
        let query = DeleteQuery {
            scope: None,
            updated_at: Some(tombstone.updated_at),
        };
        let res = self
            .http
            .delete(self.endpoint(&format!("transactions/{}", tombstone.id))?)
            .query(&query)
            .send()
            .await
            .map_err(transport)?;
        check(res).await?;
        Ok(())
    }

    async fn changes_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> std::result::Result<Changes, RemoteError> {
        let res = self
            .http
            .get(self.endpoint("transactions/changes")?)
            .query(&ChangesQuery { since })
            .send()
            .await
            .map_err(transport)?;
        let records: Vec<TransactionRecord> = check(res).await?.json().await.map_err(transport)?;
        Ok(Changes {
            cursor: records.iter().filter_map(|record| record.changed_at).max(),
            records: records.into_iter().map(Transaction::from).collect(),
        })
    }
}
