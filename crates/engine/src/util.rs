//! Internal helpers for id generation and input normalization.
//!
//! These utilities are **not** part of the public API.

use uuid::Uuid;

use crate::{EngineError, ResultEngine, calendar::YearMonth};

/// Fresh opaque id for records and plans.
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Parse an optional `"YYYY-MM"` end month supplied by a caller.
pub(crate) fn parse_end_month(value: Option<&str>) -> ResultEngine<Option<YearMonth>> {
    value
        .map(|raw| {
            YearMonth::parse(raw)
                .ok_or_else(|| EngineError::Validation(format!("invalid end month: {raw}")))
        })
        .transpose()
}
