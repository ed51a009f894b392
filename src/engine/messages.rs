//! Inbound intent and response types.
//!
//! The boundary contract the chat-bot and web adapters speak: each intent
//! maps to one engine operation, and every reply is an `(ok, message,
//! data)` triple. Messages use the client-safe error text, never raw
//! internals.

use super::errors::EngineError;
use serde::{Deserialize, Serialize};

/// Join request from an adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinIntent {
    pub user_id: i64,
    pub bet_amount: i64,
}

/// Choice submission from an adapter. The choice arrives as raw text
/// ("rock", "p", ...) and is parsed at this boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChooseIntent {
    pub match_id: i64,
    pub user_id: i64,
    pub choice: String,
}

/// Admin cancel request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelIntent {
    pub match_id: i64,
}

/// Response from intent handling: `(ok, message, data)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentResponse {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl IntentResponse {
    /// Successful response with an optional payload.
    pub fn success(message: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            data,
        }
    }

    /// Failure response carrying the client-safe error message.
    pub fn failure(err: &EngineError) -> Self {
        Self {
            ok: false,
            message: err.client_message(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_uses_client_safe_message() {
        let response = IntentResponse::failure(&EngineError::StorageUnavailable(
            "connection refused to 10.0.0.3:5432".to_string(),
        ));
        assert!(!response.ok);
        assert!(!response.message.contains("10.0.0.3"));
    }

    #[test]
    fn data_field_is_omitted_when_absent() {
        let response = IntentResponse::failure(&EngineError::Busy);
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("data"));
    }
}
