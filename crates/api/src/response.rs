//! Shared response envelope types for API handlers.
//!
//! Scan resources use a `{ "data": ... }` envelope. The analyze and health
//! endpoints return their payload unwrapped.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// `{ "status": "success", "message": ... }` acknowledgement for deletes.
#[derive(Debug, Serialize)]
pub struct StatusMessage {
    pub status: &'static str,
    pub message: &'static str,
}

impl StatusMessage {
    pub fn success(message: &'static str) -> Self {
        Self {
            status: "success",
            message,
        }
    }
}
