use super::*;

#[test]
fn http_status_matches_taxonomy() {
    assert_eq!(ErrorCode::NoAccountsConfigured.http_status(), 401);
    assert_eq!(ErrorCode::AllAccountsCoolingDown.http_status(), 429);
    assert_eq!(ErrorCode::RefreshInvalidGrant.http_status(), 401);
    assert_eq!(ErrorCode::AllAccountsRateLimited.http_status(), 429);
    assert_eq!(ErrorCode::DisallowedOutboundHost.http_status(), 400);
    assert_eq!(ErrorCode::DisallowedOutboundProtocol.http_status(), 400);
    assert_eq!(ErrorCode::RequestCancelled.http_status(), 499);
    assert_eq!(ErrorCode::PluginFetchFailed.http_status(), 502);
}

#[test]
fn as_str_is_snake_case() {
    assert_eq!(ErrorCode::NoAccountsConfigured.as_str(), "no_accounts_configured");
    assert_eq!(ErrorCode::AllAccountsRateLimited.as_str(), "all_accounts_rate_limited");
    assert_eq!(ErrorCode::DisallowedOutboundProtocol.as_str(), "disallowed_outbound_protocol");
}

#[test]
fn error_body_serializes_with_type_rename_and_omits_absent_param() {
    let body = ErrorCode::AllAccountsRateLimited.to_error_body("no eligible accounts");
    let json = serde_json::to_value(&body).expect("serialize");
    assert_eq!(json["type"], "all_accounts_rate_limited");
    assert_eq!(json["message"], "no eligible accounts");
    assert!(json.get("param").is_none());
}

#[test]
fn error_body_includes_param_when_set() {
    let mut body = ErrorCode::BadRequest.to_error_body("bad model");
    body.param = Some("model".to_owned());
    let json = serde_json::to_value(&body).expect("serialize");
    assert_eq!(json["param"], "model");
}

#[test]
fn to_http_response_wraps_in_error_envelope() {
    let (status, Json(resp)) = ErrorCode::Internal.to_http_response("boom");
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.error.r#type, "internal");
    assert_eq!(resp.error.message, "boom");
}

#[test]
fn display_matches_as_str() {
    assert_eq!(ErrorCode::RequestCancelled.to_string(), "request_cancelled");
}
