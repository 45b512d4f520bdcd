// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Synthetic error taxonomy: the fixed set of JSON error bodies the fetch
//! orchestrator returns to a caller in place of a real upstream response.

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed error taxonomy an attempt can terminate with. Never extended ad
/// hoc — a new failure mode should map onto one of these or onto a real
/// upstream status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    NoAccountsConfigured,
    AllAccountsCoolingDown,
    RefreshInvalidGrant,
    AllAccountsRateLimited,
    DisallowedOutboundHost,
    DisallowedOutboundProtocol,
    RequestCancelled,
    PluginFetchFailed,
    Unauthorized,
    BadRequest,
    NotFound,
    Internal,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NoAccountsConfigured => 401,
            Self::AllAccountsCoolingDown => 429,
            Self::RefreshInvalidGrant => 401,
            Self::AllAccountsRateLimited => 429,
            Self::DisallowedOutboundHost => 400,
            Self::DisallowedOutboundProtocol => 400,
            Self::RequestCancelled => 499,
            Self::PluginFetchFailed => 502,
            Self::Unauthorized => 401,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAccountsConfigured => "no_accounts_configured",
            Self::AllAccountsCoolingDown => "all_accounts_cooling_down",
            Self::RefreshInvalidGrant => "refresh_invalid_grant",
            Self::AllAccountsRateLimited => "all_accounts_rate_limited",
            Self::DisallowedOutboundHost => "disallowed_outbound_host",
            Self::DisallowedOutboundProtocol => "disallowed_outbound_protocol",
            Self::RequestCancelled => "request_cancelled",
            Self::PluginFetchFailed => "plugin_fetch_failed",
            Self::Unauthorized => "unauthorized",
            Self::BadRequest => "bad_request",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { r#type: self.as_str().to_owned(), message: message.into(), param: None }
    }

    /// Build the full synthetic `(status, json)` response pair.
    pub fn to_http_response(&self, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse { error: self.to_error_body(message) };
        (status, Json(body))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level synthetic error response envelope, `{"error": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body: machine-readable `type`, human-readable `message`, optional `param`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub r#type: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
