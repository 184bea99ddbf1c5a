//! Selector-engine error types.
//!
//! The only caller-facing failure is a falsy primary id handed to a
//! selector creator. Missing records, missing fields, and falsy foreign
//! keys are normal outcomes and degrade to null / empty values instead of
//! erroring.

use denorm_core::RecordId;
use thiserror::Error;

/// Errors produced by selector construction.
#[derive(Debug, Error, PartialEq)]
pub enum SelectError {
    /// A falsy primary id (`0` or `""`) was passed to a selector creator.
    #[error("invalid id: selector creators require a truthy record id, got '{id}'")]
    InvalidId { id: RecordId },
}
