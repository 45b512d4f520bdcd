use axum::http::HeaderMap;

use super::*;

fn headers_with_bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("authorization", format!("Bearer {token}").parse().unwrap());
    headers
}

#[test]
fn no_expected_token_means_no_auth_required() {
    assert!(validate_bearer(&HeaderMap::new(), None).is_ok());
}

#[test]
fn missing_header_is_unauthorized() {
    assert_eq!(validate_bearer(&HeaderMap::new(), Some("secret")), Err(ErrorCode::Unauthorized));
}

#[test]
fn matching_bearer_token_is_ok() {
    assert!(validate_bearer(&headers_with_bearer("secret"), Some("secret")).is_ok());
}

#[test]
fn mismatched_bearer_token_is_unauthorized() {
    assert_eq!(validate_bearer(&headers_with_bearer("wrong"), Some("secret")), Err(ErrorCode::Unauthorized));
}

#[test]
fn header_without_bearer_prefix_is_unauthorized() {
    let mut headers = HeaderMap::new();
    headers.insert("authorization", "secret".parse().unwrap());
    assert_eq!(validate_bearer(&headers, Some("secret")), Err(ErrorCode::Unauthorized));
}
