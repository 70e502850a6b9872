//! The replica kept on disk between invocations.

use std::{fs, path::Path};

use engine::{InitialBalance, State};
use serde::{Deserialize, Serialize};

use crate::error::Result;

const DEFAULT_STATE_PATH: &str = "config/tally_state.json";

/// `{ "transactions": [...], "lastSyncAt": ..., "initialBalance": ... }`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocalState {
    #[serde(flatten)]
    pub ledger: State,
    /// Last initial balance seen on the server, for offline balances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_balance: Option<InitialBalance>,
}

impl LocalState {
    /// A missing file is an empty replica.
    pub fn load(path: &str) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let parent = Path::new(path).parent();
        if let Some(parent) = parent {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(self)?;
        fs::write(path, payload)?;
        Ok(())
    }
}

pub fn default_state_path() -> &'static str {
    DEFAULT_STATE_PATH
}
