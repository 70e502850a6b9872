//! The module contains the errors the engine can return.
//!
//! The errors are:
//!
//! - [`Validation`] returned when a draft, patch or command argument is
//!   rejected before any mutation happens.
//! - [`NotFound`] returned when an update or delete targets an unknown id.
//!   The state is left untouched.
//!
//! Conflicts between replicas are never an error: they are resolved by
//! [`merge_remote`].
//!
//!  [`Validation`]: EngineError::Validation
//!  [`NotFound`]: EngineError::NotFound
//!  [`merge_remote`]: crate::sync::merge_remote
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("\"{0}\" not found!")]
    NotFound(String),
}
