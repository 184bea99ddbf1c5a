//! Core error types for denorm-core.
//!
//! Only JSON intake can fail here; the data model itself is total.

use thiserror::Error;

/// Errors produced while converting JSON documents into core types.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// A store or table level of the document was not a JSON object.
    #[error("expected a JSON object for {context}")]
    ExpectedObject { context: String },

    /// A schema document failed to deserialize.
    #[error("schema deserialization error: {0}")]
    Schema(#[from] serde_json::Error),
}
